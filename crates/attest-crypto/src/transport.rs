//! Colon-delimited text encoding for bundled ciphertext.
//!
//! Format: `base64(wrapped_key):base64(iv):base64(ciphertext)` using standard
//! padded base64. Exactly three parts; anything else is rejected.

use base64ct::{Base64, Encoding};

use crate::error::CryptoError;
use crate::types::EncryptedPayload;

/// Encode an [`EncryptedPayload`] as `key:iv:ciphertext`.
pub fn encode_transport(payload: &EncryptedPayload) -> String {
    format!(
        "{}:{}:{}",
        Base64::encode_string(&payload.wrapped_key),
        Base64::encode_string(&payload.iv),
        Base64::encode_string(&payload.ciphertext)
    )
}

/// Decode the `key:iv:ciphertext` form produced by [`encode_transport`].
pub fn decode_transport(encoded: &str) -> Result<EncryptedPayload, CryptoError> {
    let parts: Vec<&str> = encoded.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(CryptoError::MalformedEncoding(format!(
            "expected 3 colon-separated parts, got {}",
            parts.len()
        )));
    }
    let decode = |label: &str, part: &str| {
        Base64::decode_vec(part)
            .map_err(|e| CryptoError::MalformedEncoding(format!("{}: {}", label, e)))
    };
    Ok(EncryptedPayload {
        wrapped_key: decode("wrapped key", parts[0])?,
        iv: decode("iv", parts[1])?,
        ciphertext: decode("ciphertext", parts[2])?,
    })
}
