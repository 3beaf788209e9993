//! Integrity verification of downloaded installers.

use std::io::Read;
use std::path::Path;

use pim_schema::Sha256Digest;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Why an installer failed verification.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// The bytes do not hash to the declared digest.
    #[error("Installer hash mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// Digest from the manifest.
        expected: Sha256Digest,
        /// Digest of the downloaded bytes.
        actual: Sha256Digest,
    },

    /// The file could not be read.
    #[error("Failed to read installer for hashing: {0}")]
    Read(#[from] std::io::Error),
}

/// Result of a successful check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Digests are equal.
    Matched,
    /// Digests differ but the caller asked to proceed anyway.
    Overridden {
        /// Digest from the manifest.
        expected: Sha256Digest,
        /// Digest of the downloaded bytes.
        actual: Sha256Digest,
    },
}

/// Compute the SHA256 of a file (streaming)
///
/// # Errors
///
/// Returns [`IntegrityError::Read`] when the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<Sha256Digest, IntegrityError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

/// Compare a computed digest with the one the manifest declares.
///
/// A mismatch is an error unless `hash_override` is set.
///
/// # Errors
///
/// Returns [`IntegrityError::Mismatch`] when the digests differ without
/// override.
pub fn verify_digest(
    expected: &Sha256Digest,
    actual: &Sha256Digest,
    hash_override: bool,
) -> Result<Verification, IntegrityError> {
    if expected == actual {
        return Ok(Verification::Matched);
    }
    if hash_override {
        return Ok(Verification::Overridden {
            expected: expected.clone(),
            actual: actual.clone(),
        });
    }
    Err(IntegrityError::Mismatch {
        expected: expected.clone(),
        actual: actual.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.exe");
        std::fs::write(&path, b"test").unwrap();
        assert_eq!(sha256_file(&path).unwrap().as_str(), TEST_DIGEST);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = sha256_file(Path::new("/nonexistent/setup.exe")).unwrap_err();
        assert!(matches!(err, IntegrityError::Read(_)));
    }

    #[test]
    fn mismatch_is_fatal_without_override() {
        let expected: Sha256Digest = TEST_DIGEST.parse().unwrap();
        let actual = Sha256Digest::from_bytes(&[0u8; 32]);
        assert!(matches!(
            verify_digest(&expected, &actual, false),
            Err(IntegrityError::Mismatch { .. })
        ));
        assert!(matches!(
            verify_digest(&expected, &actual, true),
            Ok(Verification::Overridden { .. })
        ));
    }

    #[test]
    fn uppercase_manifest_digest_still_matches() {
        let expected: Sha256Digest = TEST_DIGEST.to_uppercase().parse().unwrap();
        let actual: Sha256Digest = TEST_DIGEST.parse().unwrap();
        assert_eq!(
            verify_digest(&expected, &actual, false).unwrap(),
            Verification::Matched
        );
    }
}
