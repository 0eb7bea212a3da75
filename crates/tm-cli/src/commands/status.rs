//! Status command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use tm_core::{Gate, MigrationFile};
use tm_engine::TenantState;

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::{build_engine, print_table};

/// Snapshot printed by `tm status`.
#[derive(Debug, Serialize)]
struct StatusReport {
    gate: Option<Gate>,
    tenants: Vec<TenantState>,
    pending: Vec<MigrationFile>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let engine = build_engine(global)?;

    let report = StatusReport {
        gate: engine
            .locker()
            .blocked()
            .context("Failed to inspect run lock")?,
        tenants: engine
            .tenant_states()
            .await
            .context("Failed to read version table")?,
        pending: engine
            .pending()
            .await
            .context("Failed to plan pending migrations")?,
    };

    match args.output {
        StatusOutput::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        StatusOutput::Table => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &StatusReport) {
    match report.gate {
        Some(Gate::Maintenance) => println!("Maintenance mode is on\n"),
        Some(Gate::Locked) => println!("A migration run holds the lock\n"),
        None => {}
    }

    if report.tenants.is_empty() {
        println!("No migrations applied yet");
    } else {
        let rows: Vec<Vec<String>> = report
            .tenants
            .iter()
            .map(|t| vec![t.tenant.to_string(), t.version.clone(), t.applied_at.clone()])
            .collect();
        print_table(&["TENANT", "VERSION", "APPLIED AT"], &rows);
    }

    println!();
    if report.pending.is_empty() {
        println!("No pending migrations");
        return;
    }

    println!("{} pending:", report.pending.len());
    let rows: Vec<Vec<String>> = report
        .pending
        .iter()
        .map(|f| {
            vec![
                f.tenant.to_string(),
                f.version.clone(),
                f.path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["TENANT", "VERSION", "FILE"], &rows);
}
