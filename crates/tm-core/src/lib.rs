//! tm-core - Core library for Tidemark
//!
//! Shared types and the database-independent half of the migration engine:
//! configuration, discovery of per-tenant migration files, planning, the
//! pluggable key/value store, the run lock and the scan cache.

pub mod checksum;
pub mod config;
pub mod error;
pub mod locker;
pub mod migration;
pub mod natural;
pub mod planner;
pub mod scan_cache;
pub mod scanner;
pub mod sql_utils;
pub mod store;
pub mod tenant;

pub use checksum::fingerprint;
pub use config::{Config, DatabaseConfig};
pub use error::{CoreError, CoreResult};
pub use locker::{Gate, LockGuard, LockHolder, Locker};
pub use migration::{MigrationFile, MigrationVersion};
pub use natural::natural_cmp;
pub use planner::plan;
pub use scan_cache::{CacheVerdict, ScanCache, ScanSummary};
pub use scanner::scan;
pub use store::{FsStore, MemoryStore, Store};
pub use tenant::TenantId;
