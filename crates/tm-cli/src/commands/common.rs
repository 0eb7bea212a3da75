//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tm_core::{Config, FsStore, Locker, Store};
use tm_db::{Database, DuckDbBackend};
use tm_engine::Engine;

use crate::cli::GlobalArgs;

/// Load the project configuration, honouring `--config` and `--database`.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = match &global.config {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => Config::load_from_dir(Path::new(&global.project_dir))
            .context("Failed to load project config")?,
    };
    if let Some(database) = &global.database {
        config.database.path = database.clone();
    }
    Ok(config)
}

/// Open the configured database.
pub(crate) fn create_database_connection(config: &Config) -> Result<Arc<dyn Database>> {
    let db: Arc<dyn Database> = Arc::new(
        DuckDbBackend::new(&config.database.path).context("Failed to connect to database")?,
    );
    Ok(db)
}

/// Load the configuration and build an engine on top of it.
pub(crate) fn build_engine(global: &GlobalArgs) -> Result<Engine> {
    let config = load_config(global)?;
    let db = create_database_connection(&config)?;
    Engine::new(config, db).context("Failed to initialise migration engine")
}

/// Bookkeeping store in the configured temp directory.
pub(crate) fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store = FsStore::open(&config.temp_dir)
        .with_context(|| format!("Failed to open temp dir {}", config.temp_dir.display()))?;
    Ok(Arc::new(store))
}

/// Locker over the configured temp directory, without opening the database.
pub(crate) fn build_locker(config: &Config) -> Result<Locker> {
    Ok(Locker::new(
        open_store(config)?,
        config.maintenance_marker.clone(),
    ))
}

/// Calculate column widths for table output.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a formatted table to stdout.
///
/// Left-aligned header row, a separator line of dashes, then each data row.
/// Columns are separated by two spaces.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
