//! Migrate command implementation

use anyhow::{Context, Result};
use std::time::Instant;
use tm_engine::Outcome;

use crate::cli::GlobalArgs;
use crate::commands::common::build_engine;

/// Execute the migrate command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let engine = build_engine(global)?;
    let started = Instant::now();

    let outcome = engine.process().await.context("Migration run failed")?;

    match outcome {
        Outcome::Applied(_) => println!(
            "Done: {outcome} in {:.2}s",
            started.elapsed().as_secs_f64()
        ),
        Outcome::Skipped(_) => println!("Nothing to do, {outcome}"),
    }
    Ok(())
}
