//! Migration planning
//!
//! Decides which discovered files still have to run and in which order.

use crate::error::CoreResult;
use crate::migration::{MigrationFile, MigrationVersion};
use crate::natural::natural_cmp;
use crate::tenant::TenantId;
use std::collections::HashMap;

/// Compute the ordered list of migrations to apply.
///
/// `applied` maps each tenant to its last recorded version. A file is
/// pending when its tenant has no recorded version or the recorded version
/// is strictly older. Every version token involved must parse; a single bad
/// name fails the whole plan so nothing runs out of order.
///
/// Pending files are ordered by natural comparison of the raw version token,
/// then by tenant.
pub fn plan(
    applied: &HashMap<TenantId, String>,
    available: &[MigrationFile],
) -> CoreResult<Vec<MigrationFile>> {
    let mut watermarks: HashMap<&TenantId, MigrationVersion> =
        HashMap::with_capacity(applied.len());
    for (tenant, version) in applied {
        watermarks.insert(tenant, MigrationVersion::parse(tenant, version)?);
    }

    let mut pending = Vec::new();
    for file in available {
        let version = file.parsed_version()?;
        let eligible = match watermarks.get(&file.tenant) {
            Some(last) => *last < version,
            None => true,
        };
        if eligible {
            pending.push(file.clone());
        }
    }

    pending.sort_by(|a, b| {
        natural_cmp(&a.version, &b.version).then_with(|| a.tenant.cmp(&b.tenant))
    });

    log::debug!(
        "Planned {} of {} migration files across {} tenants with recorded versions",
        pending.len(),
        available.len(),
        applied.len()
    );
    Ok(pending)
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
