use thiserror::Error;

use attest_crypto::{CryptoError, IntegrityError};
use attest_store::StoreError;

/// Message shown to end users when content cannot be decrypted or verified.
pub const RETRIEVAL_FAILED_MESSAGE: &str = "The file could not be retrieved.";

#[derive(Debug, Error)]
pub enum VaultError {
    /// Key unwrap or cipher failure. Never retried automatically.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Decrypted content does not match its recorded checksum.
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend I/O failure; the caller may retry the request.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// An audit entry could not be signed; the triggering action is aborted.
    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Path {path} is outside the {tenant} tenant prefix")]
    PathOutsideTenant { path: String, tenant: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// HTTP-style status for the outer surface.
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::NotFound(_) => 404,
            VaultError::InvalidInput(_) => 400,
            VaultError::PathOutsideTenant { .. } => 403,
            VaultError::Storage(_) => 503,
            VaultError::Crypto(_)
            | VaultError::Integrity(_)
            | VaultError::Signature(_)
            | VaultError::Database(_)
            | VaultError::Archive(_)
            | VaultError::Config(_)
            | VaultError::Json(_) => 500,
        }
    }

    /// Text safe to show an end user. Crypto and integrity detail stays in
    /// server-side logs.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Crypto(_) | VaultError::Integrity(_) => {
                RETRIEVAL_FAILED_MESSAGE.to_string()
            }
            VaultError::NotFound(what) => format!("Not found: {}", what),
            VaultError::InvalidInput(msg) => msg.clone(),
            VaultError::PathOutsideTenant { .. } => "Access denied.".to_string(),
            VaultError::Storage(_) => "Storage is temporarily unavailable.".to_string(),
            _ => "An internal error occurred.".to_string(),
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, VaultError::Integrity(_))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
