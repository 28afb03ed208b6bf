//! SHA-256 fingerprints (spec §4.13): one per source file, a composite
//! over a module's dependency set, and the pairing used to decide
//! whether a module's cached artifact is still valid.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{CacheError, CacheResult};

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

pub fn fingerprint_file(path: &Path) -> CacheResult<String> {
    let bytes = std::fs::read(path).map_err(|source| CacheError::Io { path: path.display().to_string(), source })?;
    Ok(fingerprint_bytes(&bytes))
}

/// A single fingerprint over a module and everything it depends on,
/// ordered so unrelated dependency-list reorderings don't churn the
/// cache key.
pub fn composite_fingerprint(parts: &[String]) -> String {
    let mut sorted = parts.to_vec();
    sorted.sort();
    let mut hasher = Sha256::new();
    for part in &sorted {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_identical_bytes() {
        assert_eq!(fingerprint_bytes(b"hello"), fingerprint_bytes(b"hello"));
        assert_ne!(fingerprint_bytes(b"hello"), fingerprint_bytes(b"world"));
    }

    #[test]
    fn composite_fingerprint_ignores_input_order() {
        let a = composite_fingerprint(&["one".to_string(), "two".to_string()]);
        let b = composite_fingerprint(&["two".to_string(), "one".to_string()]);
        assert_eq!(a, b);
    }
}
