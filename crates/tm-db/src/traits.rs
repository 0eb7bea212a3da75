//! Database trait definition

use crate::error::DbResult;
use async_trait::async_trait;

/// Narrow database interface consumed by the migration engine
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a single statement, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute a script of one or more statements verbatim
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query and return every row with values coerced to strings
    ///
    /// NULL values are returned as `None`.
    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Vec<Option<String>>>>;

    /// Check if a table or view exists
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;

    /// Open a transaction
    async fn begin(&self) -> DbResult<()> {
        self.execute_batch("BEGIN TRANSACTION").await
    }

    /// Commit the open transaction
    async fn commit(&self) -> DbResult<()> {
        self.execute_batch("COMMIT").await
    }

    /// Roll back the open transaction
    async fn rollback(&self) -> DbResult<()> {
        self.execute_batch("ROLLBACK").await
    }
}
