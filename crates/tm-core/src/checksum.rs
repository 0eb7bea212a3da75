//! SHA-256 fingerprint of a discovered migration set.

use crate::migration::MigrationFile;
use sha2::{Digest, Sha256};

/// Fingerprint the `(tenant, version)` pairs of `files`.
///
/// Independent of discovery order; paths are not part of the digest.
pub fn fingerprint(files: &[MigrationFile]) -> String {
    let mut pairs: Vec<(&str, &str)> = files
        .iter()
        .map(|f| (f.tenant.as_str(), f.version.as_str()))
        .collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    for (tenant, version) in pairs {
        hasher.update(tenant.as_bytes());
        hasher.update(b"/");
        hasher.update(version.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
