//! Migration file discovery
//!
//! Walks `<root>/<tenant>/<version>.sql`, exactly one level of tenant
//! directories deep. Ordering of the result is unspecified; the planner
//! sorts.

use crate::error::{CoreError, CoreResult};
use crate::migration::{MigrationFile, MIGRATION_EXTENSION};
use crate::tenant::TenantId;
use std::path::Path;

/// Discover every migration file under `root`.
///
/// Non-directory entries of `root` and non-`.sql` entries of tenant
/// directories are ignored. A tenant directory or `.sql` file whose name is
/// not valid UTF-8 fails the scan, since it could never be ordered.
pub fn scan(root: &Path) -> CoreResult<Vec<MigrationFile>> {
    if !root.is_dir() {
        return Err(CoreError::MigrationsRootNotFound {
            path: root.display().to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| CoreError::io(root, e))? {
        let entry = entry.map_err(|e| CoreError::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let Some(tenant) = name.to_str().and_then(TenantId::try_new) else {
            return Err(CoreError::InvalidTenantName {
                name: name.to_string_lossy().into_owned(),
            });
        };

        scan_tenant(&path, &tenant, &mut files)?;
    }

    log::debug!("Discovered {} migration files in {}", files.len(), root.display());
    Ok(files)
}

fn scan_tenant(dir: &Path, tenant: &TenantId, files: &mut Vec<MigrationFile>) -> CoreResult<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))? {
        let entry = entry.map_err(|e| CoreError::io(dir, e))?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_EXTENSION) {
            continue;
        }
        // A directory named `x.sql` is not a script.
        if path.is_dir() {
            continue;
        }

        let Some(stem) = path.file_stem() else {
            continue;
        };
        let Some(version) = stem.to_str() else {
            return Err(CoreError::InvalidVersionFormat {
                tenant: tenant.to_string(),
                version: stem.to_string_lossy().into_owned(),
            });
        };

        files.push(MigrationFile::new(tenant.clone(), version, path.clone()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod tests;
