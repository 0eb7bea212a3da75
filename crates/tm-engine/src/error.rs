//! Error types for the migration engine.

use thiserror::Error;
use tm_core::CoreError;

/// Migration engine errors.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Migrations root missing or temp directory unusable (M001).
    #[error("[M001] Migration engine misconfigured: {0}")]
    Configuration(String),

    /// A version token does not parse; nothing was applied (M002).
    #[error("[M002] Invalid migration version '{version}' for tenant '{tenant}': expected YYYY_MM_DD_HH_MM")]
    InvalidVersionFormat { tenant: String, version: String },

    /// Fewer migration files on disk than the scan cache recorded (M003).
    #[error("[M003] Migration files were removed: cache recorded {cached} files but {found} remain")]
    Regression { cached: usize, found: usize },

    /// A migration file could not be read or executed (M004).
    ///
    /// Files applied before it in the same run stay recorded.
    #[error("[M004] Migration {tenant}/{version} failed: {cause}")]
    MigrationExecution {
        tenant: String,
        version: String,
        cause: String,
    },

    /// Reading or writing the version table failed (M005).
    #[error("[M005] Version table operation failed: {0}")]
    StateStore(String),

    /// Store, scan or other core failure (M006).
    #[error("[M006] {0}")]
    Core(CoreError),
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;

impl From<CoreError> for MigrateError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidVersionFormat { tenant, version } => {
                MigrateError::InvalidVersionFormat { tenant, version }
            }
            CoreError::MigrationsRootNotFound { path } => {
                MigrateError::Configuration(format!("migrations directory does not exist: {path}"))
            }
            other => MigrateError::Core(other),
        }
    }
}
