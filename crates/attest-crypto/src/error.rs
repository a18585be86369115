use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid IV length: expected {expected} bytes, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    #[error("Invalid wrapped key length: expected {expected} bytes, got {got}")]
    InvalidWrappedKeyLength { expected: usize, got: usize },

    #[error("Encrypted data too short")]
    DataTooShort,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("AES-KW wrap failed: {0}")]
    WrapFailed(String),

    #[error("AES-KW unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid application secret: {0}")]
    InvalidSecret(String),

    #[error("Malformed envelope encoding: {0}")]
    MalformedEncoding(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("canonicalJSON: non-finite number is not representable in JSON")]
    NonFiniteNumber,

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}

/// Checksum mismatch between stored metadata and recomputed content digest.
///
/// Kept apart from [`CryptoError`] so callers can tell corrupted content from
/// a wrong or damaged key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Checksum mismatch: expected {expected}, got {actual}")]
pub struct IntegrityError {
    pub expected: String,
    pub actual: String,
}
