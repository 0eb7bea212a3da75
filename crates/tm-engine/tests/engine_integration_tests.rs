//! End-to-end migration runs against DuckDB and a real temp directory.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tm_core::Config;
use tm_db::{Database, DbResult, DuckDbBackend};
use tokio::sync::Notify;
use tm_engine::{Engine, MigrateError, Outcome, SkipReason};

// ── Helpers ────────────────────────────────────────────────────────────

struct Fixture {
    dir: TempDir,
    db: Arc<DuckDbBackend>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("migrations")).unwrap();
        Self {
            dir,
            db: Arc::new(DuckDbBackend::in_memory().unwrap()),
        }
    }

    fn migrations(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    fn temp(&self) -> PathBuf {
        self.dir.path().join("temp")
    }

    fn write(&self, tenant: &str, version: &str, sql: &str) -> PathBuf {
        let tenant_dir = self.migrations().join(tenant);
        fs::create_dir_all(&tenant_dir).unwrap();
        let path = tenant_dir.join(format!("{version}.sql"));
        fs::write(&path, sql).unwrap();
        path
    }

    fn config(&self) -> Config {
        Config::new(self.migrations(), self.temp())
    }

    fn engine(&self) -> Engine {
        Engine::new(self.config(), self.db.clone()).unwrap()
    }

    async fn scalar(&self, sql: &str) -> Option<String> {
        let rows = self.db.query_rows(sql).await.unwrap();
        rows.into_iter().next().and_then(|row| row.into_iter().next().flatten())
    }

    async fn column(&self, sql: &str) -> Vec<String> {
        self.db
            .query_rows(sql)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect()
    }

    async fn versions(&self) -> Vec<(String, String)> {
        self.db
            .query_rows("SELECT tenant, version FROM _database_version ORDER BY tenant")
            .await
            .unwrap()
            .into_iter()
            .map(|row| {
                let mut values = row.into_iter().map(Option::unwrap_or_default);
                let tenant = values.next().unwrap_or_default();
                let version = values.next().unwrap_or_default();
                (tenant, version.trim().to_string())
            })
            .collect()
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_fresh_database() {
    let fx = Fixture::new();
    fx.write("tenantX", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    fx.write("tenantX", "2023_01_02_00_00", "INSERT INTO t VALUES (1);");
    assert!(!fx.db.relation_exists("_database_version").await.unwrap());

    let engine = fx.engine();
    assert_eq!(engine.process().await.unwrap(), Outcome::Applied(2));

    assert_eq!(fx.scalar("SELECT COUNT(*) FROM t").await.as_deref(), Some("1"));
    assert_eq!(
        fx.versions().await,
        [("tenantX".to_string(), "2023_01_02_00_00".to_string())]
    );
    assert_eq!(read(&fx.temp().join("db-migration.dat")), "2");
    assert!(!fx.temp().join("db-migration.lock").exists());

    assert_eq!(
        engine.process().await.unwrap(),
        Outcome::Skipped(SkipReason::UpToDate)
    );
    assert_eq!(fx.scalar("SELECT COUNT(*) FROM t").await.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_second_run_is_idempotent_even_without_cache() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    fx.write("acme", "2023_01_02_00_00", "INSERT INTO t VALUES (1);");

    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(2));
    let before = fx.versions().await;

    fs::remove_file(fx.temp().join("db-migration.dat")).unwrap();
    assert_eq!(
        fx.engine().process().await.unwrap(),
        Outcome::Skipped(SkipReason::NothingPending)
    );

    assert_eq!(fx.versions().await, before);
    assert_eq!(fx.scalar("SELECT COUNT(*) FROM t").await.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_removed_files_raise_regression() {
    let fx = Fixture::new();
    let first = fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    let second = fx.write("acme", "2023_01_02_00_00", "INSERT INTO t VALUES (1);");
    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(2));
    let before = fx.versions().await;

    fs::remove_file(first).unwrap();
    fs::remove_file(second).unwrap();
    fx.write("zeta", "2023_02_01_00_00", "CREATE TABLE z (id INTEGER);");

    let err = fx.engine().process().await.unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Regression {
            cached: 2,
            found: 1
        }
    ));
    assert_eq!(fx.versions().await, before);
    assert!(!fx.db.relation_exists("z").await.unwrap());
}

#[tokio::test]
async fn test_fewer_files_than_cached_is_fatal() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    let second = fx.write("acme", "2023_01_02_00_00", "INSERT INTO t VALUES (1);");
    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(2));

    fs::remove_file(second).unwrap();
    let err = fx.engine().process().await.unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Regression {
            cached: 2,
            found: 1
        }
    ));
    assert!(err.to_string().contains("[M003]"));
    assert!(!fx.temp().join("db-migration.lock").exists());
}

#[tokio::test]
async fn test_replaced_file_with_same_count_is_detected() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    let second = fx.write("acme", "2023_01_02_00_00", "INSERT INTO t VALUES (1);");
    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(2));

    fs::remove_file(second).unwrap();
    fx.write("acme", "2023_01_03_00_00", "INSERT INTO t VALUES (3);");

    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(1));
    assert_eq!(fx.scalar("SELECT MAX(id) FROM t").await.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_count_only_cache_is_honoured() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    fs::create_dir_all(fx.temp()).unwrap();
    fs::write(fx.temp().join("db-migration.dat"), "1").unwrap();

    assert_eq!(
        fx.engine().process().await.unwrap(),
        Outcome::Skipped(SkipReason::UpToDate)
    );
    assert!(!fx.db.relation_exists("t").await.unwrap());
}

#[tokio::test]
async fn test_versions_apply_in_chronological_order() {
    let fx = Fixture::new();
    fx.write(
        "acme",
        "2021_02_01_00_00",
        "INSERT INTO log SELECT COUNT(*) + 1, '2021_02_01_00_00' FROM log;",
    );
    fx.write(
        "acme",
        "2021_01_01_00_00",
        "CREATE TABLE log (seq INTEGER, version VARCHAR);
         INSERT INTO log VALUES (1, '2021_01_01_00_00');",
    );
    fx.write(
        "acme",
        "2021_01_15_00_00",
        "INSERT INTO log SELECT COUNT(*) + 1, '2021_01_15_00_00' FROM log;",
    );

    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(3));
    assert_eq!(
        fx.column("SELECT version FROM log ORDER BY seq").await,
        ["2021_01_01_00_00", "2021_01_15_00_00", "2021_02_01_00_00"]
    );
}

#[tokio::test]
async fn test_failing_tenant_does_not_undo_earlier_tenant() {
    let fx = Fixture::new();
    fx.write("beta", "2023_01_01_00_00", "CREATE TABLE beta_t (id INTEGER);");
    let broken = fx.write("alpha", "2023_01_02_00_00", "CREATE TABL alpha_t (id INTEGER);");

    let err = fx.engine().process().await.unwrap_err();
    match err {
        MigrateError::MigrationExecution { tenant, .. } => assert_eq!(tenant, "alpha"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx.db.relation_exists("beta_t").await.unwrap());
    assert_eq!(
        fx.versions().await,
        [("beta".to_string(), "2023_01_01_00_00".to_string())]
    );
    assert!(!fx.temp().join("db-migration.lock").exists());

    fs::write(&broken, "CREATE TABLE alpha_t (id INTEGER);").unwrap();
    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(1));
    assert!(fx.db.relation_exists("alpha_t").await.unwrap());
}

#[tokio::test]
async fn test_rerun_resumes_from_failed_file() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    let broken = fx.write("acme", "2023_01_02_00_00", "INSERT INTO missing VALUES (1);");
    fx.write("acme", "2023_01_03_00_00", "INSERT INTO t VALUES (3);");

    assert!(fx.engine().process().await.is_err());
    assert_eq!(
        fx.versions().await,
        [("acme".to_string(), "2023_01_01_00_00".to_string())]
    );

    fs::write(&broken, "INSERT INTO t VALUES (2);").unwrap();
    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(2));
    assert_eq!(fx.scalar("SELECT COUNT(*) FROM t").await.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_held_lock_blocks_second_engine() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");

    let holder = fx.engine();
    let guard = holder.locker().try_acquire().unwrap().unwrap();

    assert_eq!(
        fx.engine().process().await.unwrap(),
        Outcome::Skipped(SkipReason::Locked)
    );
    assert!(!fx.db.relation_exists("_database_version").await.unwrap());

    guard.release().unwrap();
    assert_eq!(fx.engine().process().await.unwrap(), Outcome::Applied(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_runs_apply_once() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    fx.write("acme", "2023_01_02_00_00", "INSERT INTO t VALUES (1);");

    let start = Arc::new(tokio::sync::Barrier::new(2));
    let runs: Vec<_> = (0..2)
        .map(|_| {
            let engine = fx.engine();
            let start = Arc::clone(&start);
            tokio::spawn(async move {
                start.wait().await;
                engine.process().await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for run in runs {
        outcomes.push(run.await.unwrap().unwrap());
    }

    // Whichever run loses may see the lock, lose the acquire, or find the
    // work already done, but it never applies anything.
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Applied(2)))
            .count(),
        1,
        "outcomes: {outcomes:?}"
    );
    assert!(
        outcomes.iter().any(|o| matches!(
            o,
            Outcome::Skipped(
                SkipReason::Locked
                    | SkipReason::LockContention
                    | SkipReason::UpToDate
                    | SkipReason::NothingPending
            )
        )),
        "outcomes: {outcomes:?}"
    );
    assert_eq!(fx.scalar("SELECT COUNT(*) FROM t").await.as_deref(), Some("1"));
    assert!(!fx.temp().join("db-migration.lock").exists());
}

/// Delegates to DuckDB but stops inside the first script containing
/// `marker` until `resume` is notified.
struct PausingDb {
    inner: Arc<DuckDbBackend>,
    marker: &'static str,
    paused: AtomicBool,
    entered: Notify,
    resume: Notify,
}

impl PausingDb {
    fn new(inner: Arc<DuckDbBackend>, marker: &'static str) -> Self {
        Self {
            inner,
            marker,
            paused: AtomicBool::new(false),
            entered: Notify::new(),
            resume: Notify::new(),
        }
    }
}

#[async_trait]
impl Database for PausingDb {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.inner.execute(sql).await
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        if sql.contains(self.marker) && !self.paused.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.resume.notified().await;
        }
        self.inner.execute_batch(sql).await
    }

    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Vec<Option<String>>>> {
        self.inner.query_rows(sql).await
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.inner.relation_exists(name).await
    }

    fn db_type(&self) -> &'static str {
        "pausing-duckdb"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_in_progress_blocks_second_engine() {
    let fx = Fixture::new();
    fx.write(
        "acme",
        "2023_01_01_00_00",
        "-- slow\nCREATE TABLE t (id INTEGER);",
    );

    let db = Arc::new(PausingDb::new(fx.db.clone(), "-- slow"));
    let first = Engine::new(fx.config(), db.clone()).unwrap();
    let run = tokio::spawn(async move { first.process().await });

    db.entered.notified().await;
    assert!(fx.temp().join("db-migration.lock").exists());
    assert_eq!(
        fx.engine().process().await.unwrap(),
        Outcome::Skipped(SkipReason::Locked)
    );

    db.resume.notify_one();
    assert_eq!(run.await.unwrap().unwrap(), Outcome::Applied(1));
    assert!(!fx.temp().join("db-migration.lock").exists());
    assert_eq!(
        fx.engine().process().await.unwrap(),
        Outcome::Skipped(SkipReason::UpToDate)
    );
}

#[tokio::test]
async fn test_maintenance_pauses_until_marker_removed() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    let marker = fx.dir.path().join("maintenance.flag");
    let config = fx.config().with_maintenance_marker(&marker);

    let engine = Engine::new(config, fx.db.clone()).unwrap();
    engine.locker().enable_maintenance().unwrap();
    assert_eq!(
        engine.process().await.unwrap(),
        Outcome::Skipped(SkipReason::Maintenance)
    );
    assert!(!fx.temp().join("db-migration.lock").exists());

    engine.locker().disable_maintenance().unwrap();
    assert_eq!(engine.process().await.unwrap(), Outcome::Applied(1));
}

#[tokio::test]
async fn test_custom_version_table_and_file_database() {
    let fx = Fixture::new();
    fx.write("acme", "2023_01_01_00_00", "CREATE TABLE t (id INTEGER);");
    let db_path = fx.dir.path().join("app.duckdb");

    {
        let db = Arc::new(DuckDbBackend::from_path(&db_path).unwrap());
        let config = fx.config().with_version_table("tenant_versions");
        let engine = Engine::new(config, db).unwrap();
        assert_eq!(engine.process().await.unwrap(), Outcome::Applied(1));
    }

    let db = DuckDbBackend::from_path(&db_path).unwrap();
    assert!(db.relation_exists("tenant_versions").await.unwrap());
    assert!(!db.relation_exists("_database_version").await.unwrap());
    let rows = db
        .query_rows("SELECT tenant, version FROM tenant_versions")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_deref(), Some("acme"));
}
