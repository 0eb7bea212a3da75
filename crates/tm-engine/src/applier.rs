//! Execute planned migration files against the database.

use crate::error::{MigrateError, MigrateResult};
use crate::state::StateStore;
use std::sync::Arc;
use tm_core::MigrationFile;
use tm_db::Database;

/// Runs migration scripts in order and records each one as it succeeds.
pub struct Applier<'a> {
    db: Arc<dyn Database>,
    state: &'a StateStore,
    transaction_per_file: bool,
}

impl<'a> Applier<'a> {
    pub fn new(db: Arc<dyn Database>, state: &'a StateStore) -> Self {
        Self {
            db,
            state,
            transaction_per_file: false,
        }
    }

    /// Wrap each script and its version update in one transaction.
    pub fn with_transaction_per_file(mut self, enabled: bool) -> Self {
        self.transaction_per_file = enabled;
        self
    }

    /// Apply `files` in the given order.
    ///
    /// Stops at the first failure. Files applied before it stay recorded, so
    /// the next run resumes with the failing file. Returns the number of
    /// files applied.
    pub async fn apply(&self, files: &[MigrationFile]) -> MigrateResult<usize> {
        for (index, file) in files.iter().enumerate() {
            log::info!(
                "[{}/{}] Applying {}/{}",
                index + 1,
                files.len(),
                file.tenant,
                file.version
            );
            self.apply_one(file).await?;
        }
        Ok(files.len())
    }

    async fn apply_one(&self, file: &MigrationFile) -> MigrateResult<()> {
        if !file.path.is_file() {
            return Err(execution_error(
                file,
                format!("file not found: {}", file.path.display()),
            ));
        }
        let sql = std::fs::read_to_string(&file.path).map_err(|e| {
            execution_error(
                file,
                format!("cannot read {}: {e}", file.path.display()),
            )
        })?;

        if !self.transaction_per_file {
            self.db
                .execute_batch(&sql)
                .await
                .map_err(|e| execution_error(file, e.to_string()))?;
            return self.state.record_applied(&file.tenant, &file.version).await;
        }

        self.db
            .begin()
            .await
            .map_err(|e| execution_error(file, e.to_string()))?;

        let result = match self.db.execute_batch(&sql).await {
            Ok(()) => self.state.record_applied(&file.tenant, &file.version).await,
            Err(e) => Err(execution_error(file, e.to_string())),
        };

        match result {
            Ok(()) => self
                .db
                .commit()
                .await
                .map_err(|e| execution_error(file, e.to_string())),
            Err(err) => {
                if let Err(rollback) = self.db.rollback().await {
                    log::error!(
                        "Rollback after failed migration {}/{} also failed: {rollback}",
                        file.tenant,
                        file.version
                    );
                }
                Err(err)
            }
        }
    }
}

fn execution_error(file: &MigrationFile, cause: String) -> MigrateError {
    MigrateError::MigrationExecution {
        tenant: file.tenant.to_string(),
        version: file.version.clone(),
        cause,
    }
}

#[cfg(test)]
#[path = "applier_test.rs"]
mod tests;
