//! Small key/value persistence for the scan cache and the run lock
//!
//! The engine never touches the filesystem for its bookkeeping directly; it
//! goes through [`Store`], so the same logic runs against a local directory
//! ([`FsStore`]) or process memory ([`MemoryStore`]).

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Key/value store with an atomic create primitive.
pub trait Store: Send + Sync {
    /// Read the value stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> CoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Atomically create `key` if it does not exist.
    ///
    /// Returns `false` when the key already exists. Two concurrent callers
    /// must never both observe `true`.
    fn create_exclusive(&self, key: &str, value: &str) -> CoreResult<bool>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CoreResult<()>;

    /// Whether `key` currently exists.
    fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Backend name for logging
    fn store_type(&self) -> &'static str;
}

/// Store keeping one file per key inside a directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CoreError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Path of the file backing `key`.
    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn error(operation: &'static str, key: &str, err: std::io::Error) -> CoreError {
        CoreError::StoreError {
            operation,
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

impl Store for FsStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::error("get", key, e)),
        }
    }

    /// Writes to a temporary sibling first and renames it into place, so a
    /// reader never sees a half-written value.
    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let path = self.path_for(key);
        let temp_path = self.root.join(format!(".{key}.tmp"));
        fs::write(&temp_path, value).map_err(|e| Self::error("set", key, e))?;
        fs::rename(&temp_path, &path).map_err(|e| Self::error("set", key, e))?;
        Ok(())
    }

    fn create_exclusive(&self, key: &str, value: &str) -> CoreResult<bool> {
        let path = self.path_for(key);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(Self::error("create_exclusive", key, e)),
        };
        file.write_all(value.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| Self::error("create_exclusive", key, e))?;
        Ok(true)
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::error("remove", key, e)),
        }
    }

    fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.path_for(key).exists())
    }

    fn store_type(&self) -> &'static str {
        "fs"
    }
}

/// Process-local store, mostly useful for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> CoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|e| CoreError::StoreError {
            operation: "lock",
            key: String::new(),
            message: e.to_string(),
        })
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn create_exclusive(&self, key: &str, value: &str) -> CoreResult<bool> {
        let mut entries = self.entries()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
