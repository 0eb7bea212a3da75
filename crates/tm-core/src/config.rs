//! Configuration types and parsing for tidemark.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names tried by [`Config::load_from_dir`], in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["tidemark.yml", "tidemark.yaml"];

/// Default name of the version-tracking table.
pub const DEFAULT_VERSION_TABLE: &str = "_database_version";

/// Engine configuration from tidemark.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Root directory holding one subdirectory of `.sql` files per tenant
    pub migrations_dir: PathBuf,

    /// Directory for the scan cache and the run lock; created if missing
    pub temp_dir: PathBuf,

    /// Run migrations when the engine is bootstrapped via `startup`
    #[serde(default = "default_true")]
    pub run_automatically: bool,

    /// Optional path whose presence pauses migrations
    #[serde(default)]
    pub maintenance_marker: Option<PathBuf>,

    /// Name of the version-tracking table
    #[serde(default = "default_version_table")]
    pub version_table: String,

    /// Run each migration file and its version update in one transaction
    #[serde(default)]
    pub transaction_per_file: bool,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (DuckDB file, or `:memory:`)
    pub path: String,
}

const MEMORY_DB_PATH: &str = ":memory:";

fn default_true() -> bool {
    true
}

fn default_version_table() -> String {
    DEFAULT_VERSION_TABLE.to_string()
}

impl Config {
    /// Build a configuration with defaults for everything but the directories.
    ///
    /// The database defaults to an in-memory DuckDB.
    pub fn new(migrations_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                path: MEMORY_DB_PATH.to_string(),
            },
            migrations_dir: migrations_dir.into(),
            temp_dir: temp_dir.into(),
            run_automatically: true,
            maintenance_marker: None,
            version_table: default_version_table(),
            transaction_per_file: false,
        }
    }

    pub fn with_database(mut self, path: impl Into<String>) -> Self {
        self.database.path = path.into();
        self
    }

    pub fn with_maintenance_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.maintenance_marker = Some(marker.into());
        self
    }

    pub fn with_version_table(mut self, table: impl Into<String>) -> Self {
        self.version_table = table.into();
        self
    }

    pub fn with_run_automatically(mut self, enabled: bool) -> Self {
        self.run_automatically = enabled;
        self
    }

    pub fn with_transaction_per_file(mut self, enabled: bool) -> Self {
        self.transaction_per_file = enabled;
        self
    }

    /// Load configuration from a file path
    ///
    /// Relative paths are resolved against the directory holding the file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for tidemark.yml or tidemark.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        Err(CoreError::ConfigNotFound {
            path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
        })
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.migrations_dir = resolve(&self.migrations_dir);
        self.temp_dir = resolve(&self.temp_dir);
        self.maintenance_marker = self.maintenance_marker.as_deref().map(resolve);
        if self.database.path != MEMORY_DB_PATH {
            self.database.path = resolve(Path::new(&self.database.path))
                .display()
                .to_string();
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.database.path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.path cannot be empty".to_string(),
            });
        }
        if self.migrations_dir.as_os_str().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migrations_dir cannot be empty".to_string(),
            });
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "temp_dir cannot be empty".to_string(),
            });
        }
        if self.version_table.is_empty()
            || !self
                .version_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "invalid version_table '{}': must contain only alphanumeric characters and underscores",
                    self.version_table
                ),
            });
        }
        Ok(())
    }

    pub fn is_memory_database(&self) -> bool {
        self.database.path == MEMORY_DB_PATH
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
