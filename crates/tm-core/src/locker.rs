//! Run lock and maintenance gate
//!
//! Two independent gates guard the apply phase:
//!
//! - the **run lock**, a store entry created atomically by whoever applies
//!   migrations and removed when they finish;
//! - the **maintenance marker**, an operator-managed path whose mere
//!   presence pauses migrations without touching the run lock.
//!
//! [`LockGuard`] releases the run lock when dropped, so an early return or a
//! failed migration cannot leave the lock behind.

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Store key of the run lock.
pub const LOCK_KEY: &str = "db-migration.lock";

/// Why the apply phase is currently unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Another run holds the run lock.
    Locked,
    /// The maintenance marker is present.
    Maintenance,
}

/// Record written into the run lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    /// Random token identifying this acquisition
    pub token: String,
    /// Process id of the holder
    pub pid: u32,
    /// When the lock was taken
    pub acquired_at: DateTime<Utc>,
}

/// Guards the apply phase against concurrent runs and maintenance windows.
pub struct Locker {
    store: Arc<dyn Store>,
    maintenance_marker: Option<PathBuf>,
}

impl Locker {
    pub fn new(store: Arc<dyn Store>, maintenance_marker: Option<PathBuf>) -> Self {
        Self {
            store,
            maintenance_marker,
        }
    }

    pub fn maintenance_marker(&self) -> Option<&Path> {
        self.maintenance_marker.as_deref()
    }

    /// Whether the maintenance marker is present.
    pub fn is_maintenance(&self) -> bool {
        self.maintenance_marker
            .as_deref()
            .is_some_and(|marker| marker.exists())
    }

    /// Report which gate, if any, currently blocks the apply phase.
    ///
    /// Read-only; a `None` answer is advisory until [`try_acquire`](Self::try_acquire)
    /// succeeds.
    pub fn blocked(&self) -> CoreResult<Option<Gate>> {
        if self.is_maintenance() {
            return Ok(Some(Gate::Maintenance));
        }
        if self.store.exists(LOCK_KEY)? {
            return Ok(Some(Gate::Locked));
        }
        Ok(None)
    }

    /// Try to take the run lock.
    ///
    /// Returns `None` when maintenance mode is active (the run lock is left
    /// alone) or when another holder owns the lock.
    pub fn try_acquire(&self) -> CoreResult<Option<LockGuard>> {
        if self.is_maintenance() {
            log::debug!("Maintenance marker present, not acquiring run lock");
            return Ok(None);
        }

        let holder = LockHolder {
            token: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let record = serde_json::to_string(&holder)?;
        if !self.store.create_exclusive(LOCK_KEY, &record)? {
            log::debug!("Run lock already held");
            return Ok(None);
        }

        log::debug!("Acquired run lock (token {})", holder.token);
        Ok(Some(LockGuard {
            store: Arc::clone(&self.store),
            token: holder.token,
            released: false,
        }))
    }

    /// Current holder of the run lock, if any.
    ///
    /// A lock whose content cannot be decoded (for example an empty file
    /// created by hand) is reported with an empty token.
    pub fn holder(&self) -> CoreResult<Option<LockHolder>> {
        let Some(raw) = self.store.get(LOCK_KEY)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw).unwrap_or_else(|_| {
            LockHolder {
                token: String::new(),
                pid: 0,
                acquired_at: DateTime::<Utc>::default(),
            }
        })))
    }

    /// Remove the run lock regardless of who holds it.
    ///
    /// Operator recovery after a crashed run; returns the removed holder.
    pub fn force_release(&self) -> CoreResult<Option<LockHolder>> {
        let holder = self.holder()?;
        if holder.is_some() {
            self.store.remove(LOCK_KEY)?;
            log::warn!("Run lock forcibly released");
        }
        Ok(holder)
    }

    /// Create the maintenance marker.
    pub fn enable_maintenance(&self) -> CoreResult<()> {
        let marker = self.require_marker()?;
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        std::fs::write(marker, Utc::now().to_rfc3339()).map_err(|e| CoreError::io(marker, e))
    }

    /// Remove the maintenance marker. Missing marker is not an error.
    pub fn disable_maintenance(&self) -> CoreResult<()> {
        let marker = self.require_marker()?;
        match std::fs::remove_file(marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::io(marker, e)),
        }
    }

    fn require_marker(&self) -> CoreResult<&Path> {
        self.maintenance_marker
            .as_deref()
            .ok_or_else(|| CoreError::ConfigInvalid {
                message: "maintenance_marker is not configured".to_string(),
            })
    }
}

/// Proof of holding the run lock. Releases it on drop.
#[must_use = "dropping the guard releases the run lock immediately"]
pub struct LockGuard {
    store: Arc<dyn Store>,
    token: String,
    released: bool,
}

impl LockGuard {
    /// Release the lock, reporting store failures.
    pub fn release(mut self) -> CoreResult<()> {
        self.released = true;
        self.release_inner()
    }

    fn release_inner(&self) -> CoreResult<()> {
        // Leave the lock alone if an operator force-released it and someone
        // else has taken it since.
        if let Some(raw) = self.store.get(LOCK_KEY)? {
            let current: Option<LockHolder> = serde_json::from_str(&raw).ok();
            if current.is_some_and(|h| h.token != self.token) {
                log::warn!("Run lock now belongs to another holder, not releasing");
                return Ok(());
            }
            self.store.remove(LOCK_KEY)?;
            log::debug!("Released run lock (token {})", self.token);
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release_inner() {
            log::error!("Failed to release run lock: {e}");
        }
    }
}

#[cfg(test)]
#[path = "locker_test.rs"]
mod tests;
