//! Migration engine for Tidemark.
//!
//! Applies per-tenant SQL migration files to a [`tm_db::Database`], tracking
//! the last applied version of every tenant in a version table. Runs are
//! guarded by a run lock and a maintenance marker, and skipped cheaply when
//! the migration tree has not changed since the last run.

pub mod applier;
pub mod engine;
pub mod error;
pub mod state;

pub use applier::Applier;
pub use engine::{startup, Engine, Outcome, SkipReason};
pub use error::{MigrateError, MigrateResult};
pub use state::{StateStore, TenantState};
