//! Applied-state bookkeeping.
//!
//! [`StateStore`] owns the version table (one row per tenant holding the last
//! applied version) and the scan cache that lives outside the database.

use crate::error::{MigrateError, MigrateResult};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tm_core::sql_utils::{quote_ident, quote_literal};
use tm_core::{ScanCache, ScanSummary, TenantId};
use tm_db::Database;

/// One row of the version table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantState {
    pub tenant: TenantId,
    pub version: String,
    pub applied_at: String,
}

/// Version table plus scan cache.
pub struct StateStore {
    db: Arc<dyn Database>,
    table: String,
    cache: ScanCache,
}

impl StateStore {
    /// `table` must already be validated as a plain identifier.
    pub fn new(db: Arc<dyn Database>, table: impl Into<String>, cache: ScanCache) -> Self {
        Self {
            db,
            table: table.into(),
            cache,
        }
    }

    fn quoted_table(&self) -> String {
        quote_ident(&self.table)
    }

    fn db_error(&self, action: &str, err: tm_db::DbError) -> MigrateError {
        MigrateError::StateStore(format!("{action} '{}': {err}", self.table))
    }

    /// Create the version table if it does not exist.
    pub async fn ensure_schema(&self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                tenant     VARCHAR(64) NOT NULL PRIMARY KEY,
                version    CHAR(16) NOT NULL,
                applied_at TIMESTAMP NOT NULL
            )",
            self.quoted_table()
        );
        self.db
            .execute_batch(&sql)
            .await
            .map_err(|e| self.db_error("failed to create", e))
    }

    /// Last applied version for every tenant, read in one query.
    ///
    /// A missing table yields an empty map.
    pub async fn fetch_applied_versions(&self) -> MigrateResult<HashMap<TenantId, String>> {
        if !self.table_exists().await? {
            return Ok(HashMap::new());
        }

        let sql = format!("SELECT tenant, version FROM {}", self.quoted_table());
        let rows = self
            .db
            .query_rows(&sql)
            .await
            .map_err(|e| self.db_error("failed to read", e))?;

        let mut applied = HashMap::with_capacity(rows.len());
        for row in rows {
            let mut values = row.into_iter();
            let (Some(Some(tenant)), Some(Some(version))) = (values.next(), values.next()) else {
                continue;
            };
            let Some(tenant) = TenantId::try_new(tenant) else {
                continue;
            };
            applied.insert(tenant, version.trim().to_string());
        }
        Ok(applied)
    }

    /// Record `version` as the last applied migration of `tenant`.
    ///
    /// Inserts the tenant's row on first use and updates it afterwards.
    /// Recording the version already stored is a no-op.
    pub async fn record_applied(&self, tenant: &TenantId, version: &str) -> MigrateResult<()> {
        let table = self.quoted_table();
        let tenant_lit = quote_literal(tenant.as_str());
        let version_lit = quote_literal(version);
        let now_lit = quote_literal(&Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());

        let current = self
            .db
            .query_rows(&format!(
                "SELECT version FROM {table} WHERE tenant = {tenant_lit}"
            ))
            .await
            .map_err(|e| self.db_error("failed to read", e))?;

        let sql = match current.first().and_then(|row| row.first()) {
            Some(Some(existing)) if existing.trim() == version => {
                log::debug!("Version {version} already recorded for {tenant}");
                return Ok(());
            }
            Some(_) => format!(
                "UPDATE {table} SET version = {version_lit}, applied_at = CAST({now_lit} AS TIMESTAMP) \
                 WHERE tenant = {tenant_lit}"
            ),
            None => format!(
                "INSERT INTO {table} (tenant, version, applied_at) \
                 VALUES ({tenant_lit}, {version_lit}, CAST({now_lit} AS TIMESTAMP))"
            ),
        };

        self.db
            .execute(&sql)
            .await
            .map_err(|e| self.db_error("failed to update", e))?;
        Ok(())
    }

    /// Every row of the version table, ordered by tenant.
    pub async fn tenant_states(&self) -> MigrateResult<Vec<TenantState>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT tenant, version, CAST(applied_at AS VARCHAR) FROM {} ORDER BY tenant",
            self.quoted_table()
        );
        let rows = self
            .db
            .query_rows(&sql)
            .await
            .map_err(|e| self.db_error("failed to read", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter().map(Option::unwrap_or_default);
                let tenant = TenantId::try_new(values.next()?)?;
                Some(TenantState {
                    tenant,
                    version: values.next()?.trim().to_string(),
                    applied_at: values.next()?,
                })
            })
            .collect())
    }

    async fn table_exists(&self) -> MigrateResult<bool> {
        self.db
            .relation_exists(&self.table)
            .await
            .map_err(|e| self.db_error("failed to look up", e))
    }

    /// Last file count written to the scan cache; `None` if never written.
    pub fn read_cached_file_count(&self) -> MigrateResult<Option<usize>> {
        Ok(self.cache.read_file_count()?)
    }

    pub fn write_cached_file_count(&self, count: usize) -> MigrateResult<()> {
        Ok(self.cache.write_file_count(count)?)
    }

    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }

    /// Persist the scan that was just fully checked.
    pub fn write_scan_cache(&self, summary: &ScanSummary) -> MigrateResult<()> {
        Ok(self.cache.write(summary)?)
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
