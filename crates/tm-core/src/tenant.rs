//! Strongly-typed tenant identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Identifier of a tenant ("user") owning a directory of migrations.
///
/// The value is the tenant directory's name under the migrations root and is
/// also the primary key of the version table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a new `TenantId`, panicking in debug builds if the id is empty.
    ///
    /// Prefer [`try_new`](Self::try_new) for names read from disk.
    pub fn new(id: impl Into<String>) -> Self {
        let s = id.into();
        debug_assert!(!s.is_empty(), "TenantId must not be empty");
        Self(s)
    }

    /// Try to create a new `TenantId`, returning `None` if the id is empty.
    pub fn try_new(id: impl Into<String>) -> Option<Self> {
        let s = id.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TenantId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TenantId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TenantId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TenantId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
