//! SHA-256 content checksums over plaintext.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::IntegrityError;

/// Lowercase hex SHA-256 of `content`.
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compare the checksum of `content` against `expected` in constant time.
///
/// The comparison covers every byte regardless of where the first difference
/// is. A length mismatch returns false.
pub fn verify_checksum(content: &[u8], expected: &str) -> bool {
    let actual = checksum(content);
    let expected = expected.trim().to_ascii_lowercase();
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Like [`verify_checksum`] but returns a typed [`IntegrityError`] on mismatch.
pub fn ensure_checksum(content: &[u8], expected: &str) -> Result<(), IntegrityError> {
    if verify_checksum(content, expected) {
        Ok(())
    } else {
        Err(IntegrityError {
            expected: expected.to_string(),
            actual: checksum(content),
        })
    }
}
