//! Unlock command implementation

use anyhow::{Context, Result};
use std::sync::Arc;
use tm_core::{Locker, ScanCache};

use crate::cli::{GlobalArgs, UnlockArgs};
use crate::commands::common::{load_config, open_store};

/// Execute the unlock command
pub fn execute(args: &UnlockArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let store = open_store(&config)?;
    let locker = Locker::new(Arc::clone(&store), config.maintenance_marker.clone());

    match locker.force_release().context("Failed to release run lock")? {
        Some(holder) if holder.token.is_empty() => {
            println!("Removed run lock with unreadable holder record");
        }
        Some(holder) => println!(
            "Removed run lock held by pid {} since {}",
            holder.pid,
            holder.acquired_at.to_rfc3339()
        ),
        None => println!("No run lock present"),
    }

    if args.reset_cache {
        ScanCache::new(store)
            .clear()
            .context("Failed to clear scan cache")?;
        println!("Cleared scan cache; the next migrate checks the database");
    }
    Ok(())
}
