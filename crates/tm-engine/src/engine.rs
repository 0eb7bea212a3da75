//! Run orchestration
//!
//! [`Engine::process`] is the single entry point: it gates on the run lock
//! and the maintenance marker, consults the scan cache, and only then
//! touches the database.

use crate::applier::Applier;
use crate::error::{MigrateError, MigrateResult};
use crate::state::{StateStore, TenantState};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tm_core::{
    plan, scan, CacheVerdict, Config, FsStore, Gate, Locker, MigrationFile, ScanCache,
    ScanSummary, Store,
};
use tm_db::Database;

/// Why a run applied nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The run lock was present when the run started.
    Locked,
    /// The maintenance marker was present.
    Maintenance,
    /// The scan matched the cache; the database was not consulted.
    UpToDate,
    /// Another run took the lock between the check and the acquire.
    LockContention,
    /// The database was checked and every file was already applied.
    NothingPending,
}

impl From<Gate> for SkipReason {
    fn from(gate: Gate) -> Self {
        match gate {
            Gate::Locked => SkipReason::Locked,
            Gate::Maintenance => SkipReason::Maintenance,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Locked => "another run holds the lock",
            SkipReason::Maintenance => "maintenance mode is active",
            SkipReason::UpToDate => "migration files unchanged since last run",
            SkipReason::LockContention => "lost the race for the run lock",
            SkipReason::NothingPending => "no pending migrations",
        };
        f.write_str(text)
    }
}

/// Result of one [`Engine::process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// This many files were applied (always at least one).
    Applied(usize),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn applied_count(&self) -> usize {
        match self {
            Outcome::Applied(n) => *n,
            Outcome::Skipped(_) => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied(1) => write!(f, "applied 1 migration"),
            Outcome::Applied(n) => write!(f, "applied {n} migrations"),
            Outcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Per-tenant migration engine.
pub struct Engine {
    config: Config,
    db: Arc<dyn Database>,
    locker: Locker,
    state: StateStore,
}

impl Engine {
    /// Build an engine whose scan cache and run lock live in `config.temp_dir`.
    ///
    /// The temp directory is created only once the config has been accepted.
    pub fn new(config: Config, db: Arc<dyn Database>) -> MigrateResult<Self> {
        check_config(&config)?;
        let store = FsStore::open(&config.temp_dir).map_err(|e| {
            MigrateError::Configuration(format!(
                "cannot use temp directory {}: {e}",
                config.temp_dir.display()
            ))
        })?;
        Self::with_store(config, db, Arc::new(store))
    }

    /// Build an engine over an explicit bookkeeping store.
    pub fn with_store(
        config: Config,
        db: Arc<dyn Database>,
        store: Arc<dyn Store>,
    ) -> MigrateResult<Self> {
        check_config(&config)?;

        log::debug!(
            "Migration engine on {} with {} bookkeeping store",
            db.db_type(),
            store.store_type()
        );

        let locker = Locker::new(Arc::clone(&store), config.maintenance_marker.clone());
        let state = StateStore::new(
            Arc::clone(&db),
            config.version_table.clone(),
            ScanCache::new(store),
        );
        Ok(Self {
            config,
            db,
            locker,
            state,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn locker(&self) -> &Locker {
        &self.locker
    }

    /// Run one migration pass.
    ///
    /// Skips without touching the database when the run is gated or the
    /// scan cache says nothing changed. The run lock is released on every
    /// exit path once taken.
    pub async fn process(&self) -> MigrateResult<Outcome> {
        if let Some(gate) = self.locker.blocked()? {
            log::debug!("Migrations gated: {gate:?}");
            return Ok(Outcome::Skipped(gate.into()));
        }

        let files = scan(&self.config.migrations_dir)?;
        let summary = ScanSummary::of(&files);

        match self.state.cache().verdict(&summary)? {
            CacheVerdict::Regressed { cached, found } => {
                return Err(MigrateError::Regression { cached, found });
            }
            CacheVerdict::Fresh => {
                log::debug!("{} migration files unchanged, skipping", summary.file_count);
                return Ok(Outcome::Skipped(SkipReason::UpToDate));
            }
            CacheVerdict::Missing | CacheVerdict::Stale => {}
        }

        if let Some(gate) = self.locker.blocked()? {
            log::debug!("Migrations gated after scan: {gate:?}");
            return Ok(Outcome::Skipped(gate.into()));
        }

        let Some(guard) = self.locker.try_acquire()? else {
            log::debug!("Run lock taken by a concurrent run");
            return Ok(Outcome::Skipped(SkipReason::LockContention));
        };

        let applied = self.run_locked(&files, &summary).await?;
        guard.release()?;

        if applied == 0 {
            return Ok(Outcome::Skipped(SkipReason::NothingPending));
        }
        log::info!("Applied {applied} migrations");
        Ok(Outcome::Applied(applied))
    }

    async fn run_locked(
        &self,
        files: &[MigrationFile],
        summary: &ScanSummary,
    ) -> MigrateResult<usize> {
        let applied = self.state.fetch_applied_versions().await?;
        let pending = plan(&applied, files)?;

        self.state.ensure_schema().await?;

        let count = if pending.is_empty() {
            0
        } else {
            Applier::new(Arc::clone(&self.db), &self.state)
                .with_transaction_per_file(self.config.transaction_per_file)
                .apply(&pending)
                .await?
        };

        self.state.write_scan_cache(summary)?;
        Ok(count)
    }

    /// Files that would run next, in order. Takes no lock and writes nothing.
    pub async fn pending(&self) -> MigrateResult<Vec<MigrationFile>> {
        let files = scan(&self.config.migrations_dir)?;
        let applied = self.state.fetch_applied_versions().await?;
        Ok(plan(&applied, &files)?)
    }

    /// Recorded version for every tenant.
    pub async fn tenant_states(&self) -> MigrateResult<Vec<TenantState>> {
        self.state.tenant_states().await
    }
}

fn check_config(config: &Config) -> MigrateResult<()> {
    config
        .validate()
        .map_err(|e| MigrateError::Configuration(e.to_string()))?;
    if !config.migrations_dir.is_dir() {
        return Err(MigrateError::Configuration(format!(
            "migrations directory does not exist: {}",
            config.migrations_dir.display()
        )));
    }
    Ok(())
}

/// Run migrations at application startup when `run_automatically` is set.
///
/// Returns `None` when automatic runs are disabled.
pub async fn startup(config: Config, db: Arc<dyn Database>) -> MigrateResult<Option<Outcome>> {
    if !config.run_automatically {
        log::info!("Automatic migrations disabled");
        return Ok(None);
    }
    let outcome = Engine::new(config, db)?.process().await?;
    log::info!("Startup migrations: {outcome}");
    Ok(Some(outcome))
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
