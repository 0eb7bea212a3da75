//! Tidemark CLI - apply per-tenant SQL migrations

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;
use commands::{maintenance, migrate, status, unlock};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match &cli.command {
        cli::Commands::Migrate => migrate::execute(&cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
        cli::Commands::Unlock(args) => unlock::execute(args, &cli.global),
        cli::Commands::Maintenance(args) => maintenance::execute(args, &cli.global),
    }
}

/// Route `log` records from the library crates to stderr.
///
/// `RUST_LOG` wins over `--verbose` when set.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
