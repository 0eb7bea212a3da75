//! Error types for tm-core

use thiserror::Error;

/// Core error type for Tidemark
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Migrations root directory missing or not a directory
    #[error("[E004] Migrations directory not found: {path}")]
    MigrationsRootNotFound { path: String },

    /// E005: Version token does not parse as `YYYY_MM_DD_HH_MM`
    #[error("[E005] Invalid migration version '{version}' for tenant '{tenant}': expected YYYY_MM_DD_HH_MM")]
    InvalidVersionFormat { tenant: String, version: String },

    /// E006: IO error with file path context
    #[error("[E006] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E007: Store backend failure
    #[error("[E007] Store operation '{operation}' failed for key '{key}': {message}")]
    StoreError {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// E008: JSON serialization/deserialization error
    #[error("[E008] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// E009: Tenant directory name is not valid UTF-8
    #[error("[E009] Invalid tenant directory name '{name}': must be valid UTF-8")]
    InvalidTenantName { name: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        }
    }
}
