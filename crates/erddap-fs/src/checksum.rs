//! SHA-256 checksum utilities
//!
//! Rendered documents are compared by checksum so an unchanged
//! datasets.xml is not rewritten (and its mtime is not touched).

use sha2::{Digest, Sha256};

use crate::{Error, NormalizedPath, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the checksum of a file's contents, or `None` if it does not exist.
pub fn compute_file_checksum(path: &NormalizedPath) -> Result<Option<String>> {
    let native_path = path.to_native();
    match std::fs::read(&native_path) {
        Ok(content) => Ok(Some(compute_checksum(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_has_prefix() {
        assert!(compute_checksum(b"hello world").starts_with("sha256:"));
    }

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(compute_checksum(b"test"), compute_checksum(b"test"));
    }

    #[test]
    fn checksum_known_value() {
        assert_eq!(
            compute_checksum(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn missing_file_has_no_checksum() {
        let path = NormalizedPath::new("/nonexistent/datasets.xml");
        assert_eq!(compute_file_checksum(&path).unwrap(), None);
    }
}
