//! Cache key derivation

use nbrun_core::CACHE_RECORD_EXTENSION;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Lowercase hex SHA-256 of the canonical notebook path.
///
/// Callers pass the canonical absolute path; hashing the textual form the
/// user typed would split one notebook across several records.
pub fn cache_key(canonical_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_path.as_os_str().as_encoded_bytes());
    hex::encode(hasher.finalize())
}

/// File name of the record for a notebook
pub fn record_file_name(canonical_path: &Path) -> String {
    format!("{}.{CACHE_RECORD_EXTENSION}", cache_key(canonical_path))
}
