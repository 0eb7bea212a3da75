//! Migration file representation and version tokens
//!
//! A migration is a `.sql` file at `<migrations_dir>/<tenant>/<version>.sql`.
//! The version token doubles as the ordering key and must follow the
//! `YYYY_MM_DD_HH_MM` timestamp convention.

use crate::error::{CoreError, CoreResult};
use crate::tenant::TenantId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `chrono` format string matching version tokens such as `2023_01_31_14_05`.
pub const VERSION_FORMAT: &str = "%Y_%m_%d_%H_%M";

/// Extension (case-sensitive) of migration files.
pub const MIGRATION_EXTENSION: &str = "sql";

/// A migration file discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// Owning tenant (name of the parent directory)
    pub tenant: TenantId,

    /// Version token (file name without the `.sql` extension)
    pub version: String,

    /// Full path to the SQL script
    pub path: PathBuf,
}

impl MigrationFile {
    pub fn new(tenant: TenantId, version: impl Into<String>, path: PathBuf) -> Self {
        Self {
            tenant,
            version: version.into(),
            path,
        }
    }

    /// Parse this file's version token into its sortable key.
    pub fn parsed_version(&self) -> CoreResult<MigrationVersion> {
        MigrationVersion::parse(&self.tenant, &self.version)
    }
}

/// A version token together with the timestamp it encodes.
///
/// Ordering and equality use the timestamp only, so `2021_1_5_0_0` and
/// `2021_01_05_00_00` compare equal.
#[derive(Debug, Clone)]
pub struct MigrationVersion {
    raw: String,
    key: NaiveDateTime,
}

impl MigrationVersion {
    /// Parse `raw` for `tenant`, failing with [`CoreError::InvalidVersionFormat`].
    ///
    /// Only digits and underscores are accepted. The raw token is also the
    /// sort key, so padding that the timestamp parser would skip is rejected.
    pub fn parse(tenant: &TenantId, raw: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidVersionFormat {
            tenant: tenant.to_string(),
            version: raw.to_string(),
        };
        if !raw.bytes().all(|b| b.is_ascii_digit() || b == b'_') {
            return Err(invalid());
        }
        let key = NaiveDateTime::parse_from_str(raw, VERSION_FORMAT).map_err(|_| invalid())?;
        Ok(Self {
            raw: raw.to_string(),
            key,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> NaiveDateTime {
        self.key
    }
}

impl PartialEq for MigrationVersion {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MigrationVersion {}

impl PartialOrd for MigrationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MigrationVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
