//! HMAC-SHA256 keyed hashes for tamper detection.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::secret::AppSecret;

type HmacSha256 = Hmac<Sha256>;

/// Produces and checks hex-encoded HMAC-SHA256 signatures.
#[derive(Clone)]
pub struct Signer {
    key: Zeroizing<Vec<u8>>,
}

impl Signer {
    /// Signer keyed by raw bytes.
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: Zeroizing::new(key.to_vec()),
        }
    }

    /// Signer keyed by the audit-signing key derived from `secret`.
    pub fn from_app_secret(secret: &AppSecret) -> Result<Self, CryptoError> {
        let key = secret.audit_signing_key()?;
        Ok(Self::new(key.as_slice()))
    }

    /// Signer keyed by a dedicated signing secret, used verbatim.
    pub fn from_dedicated_secret(secret: &AppSecret) -> Self {
        Self::new(secret.expose())
    }

    /// Hex HMAC-SHA256 over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<String, CryptoError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        mac.update(message);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Recompute the signature for `message` and compare it with `signature`
    /// in constant time. Any failure (bad hex, wrong length) is `false`.
    pub fn verify(&self, message: &[u8], signature: &str) -> bool {
        let expected = match self.sign(message) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let provided = signature.trim().to_ascii_lowercase();
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Signer { .. }")
    }
}
