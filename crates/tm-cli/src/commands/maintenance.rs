//! Maintenance command implementation

use anyhow::{bail, Context, Result};

use crate::cli::{GlobalArgs, MaintenanceAction, MaintenanceArgs};
use crate::commands::common::{build_locker, load_config};

/// Execute the maintenance command
pub fn execute(args: &MaintenanceArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let locker = build_locker(&config)?;
    let Some(marker) = locker.maintenance_marker() else {
        bail!("maintenance_marker is not set in the project config");
    };
    let marker = marker.display().to_string();

    match args.action {
        MaintenanceAction::On => {
            locker
                .enable_maintenance()
                .context("Failed to enable maintenance mode")?;
            println!("Maintenance mode on ({marker})");
        }
        MaintenanceAction::Off => {
            locker
                .disable_maintenance()
                .context("Failed to disable maintenance mode")?;
            println!("Maintenance mode off");
        }
        MaintenanceAction::Status => {
            let state = if locker.is_maintenance() { "on" } else { "off" };
            println!("Maintenance mode {state} ({marker})");
        }
    }
    Ok(())
}
