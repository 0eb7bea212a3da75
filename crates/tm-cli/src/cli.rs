//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Tidemark - apply per-tenant SQL migrations
#[derive(Parser, Debug)]
#[command(name = "tm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override database path from the config file
    #[arg(long, global = true, env = "TIDEMARK_DATABASE")]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Migrate,

    /// Show applied versions and pending migrations
    Status(StatusArgs),

    /// Remove a stale run lock left by a crashed run
    Unlock(UnlockArgs),

    /// Pause or resume migrations
    Maintenance(MaintenanceArgs),
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: StatusOutput,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// Arguments for the unlock command
#[derive(Args, Debug)]
pub struct UnlockArgs {
    /// Also clear the scan cache so the next migrate checks the database
    #[arg(long)]
    pub reset_cache: bool,
}

/// Arguments for the maintenance command
#[derive(Args, Debug)]
pub struct MaintenanceArgs {
    /// What to do with the maintenance marker
    #[arg(value_enum)]
    pub action: MaintenanceAction,
}

/// Maintenance marker actions
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Create the marker; migrations are skipped until it is removed
    On,
    /// Remove the marker
    Off,
    /// Report whether the marker is present
    Status,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
