//! Application secret parsing and purpose-specific key derivation.

use std::fmt;

use base64ct::{Base64, Encoding};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hkdf::hkdf_derive;
use crate::types::{AES_KEY_LENGTH, AUDIT_SIGNING_INFO, HKDF_SALT, KEY_WRAP_INFO, MIN_SECRET_LENGTH};

/// Long-lived, process-wide application secret.
///
/// Accepted encodings: `base64:<standard base64>` or plain hex. The raw bytes
/// are zeroized on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct AppSecret {
    bytes: Zeroizing<Vec<u8>>,
}

impl AppSecret {
    /// Wrap raw secret bytes. Rejects secrets shorter than 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SECRET_LENGTH {
            return Err(CryptoError::InvalidSecret(format!(
                "secret must be at least {} bytes, got {}",
                MIN_SECRET_LENGTH,
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// Parse a configured secret string.
    pub fn parse(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        let bytes = match encoded.strip_prefix("base64:") {
            Some(b64) => Base64::decode_vec(b64)
                .map_err(|e| CryptoError::InvalidSecret(format!("base64: {}", e)))?,
            None => hex::decode(encoded)
                .map_err(|e| CryptoError::InvalidSecret(format!("hex: {}", e)))?,
        };
        let bytes = Zeroizing::new(bytes);
        Self::from_bytes(&bytes)
    }

    /// KEK used to wrap per-payload data keys.
    pub fn key_wrap_key(&self) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
        hkdf_derive(&self.bytes, HKDF_SALT, KEY_WRAP_INFO)
    }

    /// Key for audit-trail signatures, derived under a separate label so it
    /// never equals the key-wrapping key.
    pub fn audit_signing_key(&self) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
        hkdf_derive(&self.bytes, HKDF_SALT, AUDIT_SIGNING_INFO)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSecret")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
