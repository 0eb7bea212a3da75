//! Scan cache: a cheap gate in front of the database check
//!
//! After a successful run the engine records how many migration files were
//! on disk (and a fingerprint of them). The next invocation compares the
//! fresh scan against that record and skips the database entirely when
//! nothing changed. The database remains the source of truth for what has
//! been applied; this cache only decides whether to look.

use crate::checksum::fingerprint;
use crate::error::CoreResult;
use crate::migration::MigrationFile;
use crate::store::Store;
use std::sync::Arc;

/// Store key holding the file count as plain decimal text.
pub const FILE_COUNT_KEY: &str = "db-migration.dat";

/// Store key holding the fingerprint of the scanned set.
pub const FINGERPRINT_KEY: &str = "db-migration.sum";

/// What a scan found, in the form the cache records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub file_count: usize,
    pub fingerprint: String,
}

impl ScanSummary {
    pub fn of(files: &[MigrationFile]) -> Self {
        Self {
            file_count: files.len(),
            fingerprint: fingerprint(files),
        }
    }
}

/// Result of comparing a scan against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheVerdict {
    /// No usable cache record; a full check is needed.
    Missing,
    /// Count (and fingerprint, when recorded) unchanged.
    Fresh,
    /// The set of files changed; a full check is needed.
    Stale,
    /// Fewer files on disk than recorded.
    Regressed { cached: usize, found: usize },
}

/// Cache record persisted in a [`Store`].
pub struct ScanCache {
    store: Arc<dyn Store>,
}

impl ScanCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Last recorded file count. `None` when never written or unreadable.
    pub fn read_file_count(&self) -> CoreResult<Option<usize>> {
        let Some(raw) = self.store.get(FILE_COUNT_KEY)? else {
            return Ok(None);
        };
        match raw.trim().parse::<usize>() {
            Ok(count) => Ok(Some(count)),
            Err(_) => {
                log::warn!("Ignoring unreadable scan cache value {raw:?}");
                Ok(None)
            }
        }
    }

    pub fn write_file_count(&self, count: usize) -> CoreResult<()> {
        self.store.set(FILE_COUNT_KEY, &count.to_string())
    }

    pub fn read_fingerprint(&self) -> CoreResult<Option<String>> {
        Ok(self
            .store
            .get(FINGERPRINT_KEY)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Record `summary` as the last successfully checked scan.
    pub fn write(&self, summary: &ScanSummary) -> CoreResult<()> {
        self.store.set(FINGERPRINT_KEY, &summary.fingerprint)?;
        self.write_file_count(summary.file_count)
    }

    /// Compare `summary` with the recorded state.
    ///
    /// A cache written by an older version holds only the count; in that
    /// case an equal count is treated as fresh.
    pub fn verdict(&self, summary: &ScanSummary) -> CoreResult<CacheVerdict> {
        let Some(cached) = self.read_file_count()? else {
            return Ok(CacheVerdict::Missing);
        };

        if cached > summary.file_count {
            return Ok(CacheVerdict::Regressed {
                cached,
                found: summary.file_count,
            });
        }
        if cached < summary.file_count {
            return Ok(CacheVerdict::Stale);
        }

        match self.read_fingerprint()? {
            Some(recorded) if recorded != summary.fingerprint => Ok(CacheVerdict::Stale),
            _ => Ok(CacheVerdict::Fresh),
        }
    }

    /// Drop the cache so the next run performs a full check.
    pub fn clear(&self) -> CoreResult<()> {
        self.store.remove(FINGERPRINT_KEY)?;
        self.store.remove(FILE_COUNT_KEY)
    }
}

#[cfg(test)]
#[path = "scan_cache_test.rs"]
mod tests;
