//! Envelope encryption: fresh DEK + IV per payload, DEK wrapped under the KEK.
//!
//! Pipeline:
//! encrypt: DEK ← random, IV ← random, C ← AES-GCM(DEK, IV, P), W ← AES-KW(KEK, DEK)
//! decrypt: DEK ← AES-KW⁻¹(KEK, W), P ← AES-GCM⁻¹(DEK, IV, C)

use zeroize::Zeroizing;

use crate::aes_gcm::{aes_gcm_decrypt, aes_gcm_encrypt, generate_iv};
use crate::dek::{generate_dek, unwrap_dek, wrap_dek};
use crate::error::CryptoError;
use crate::secret::AppSecret;
use crate::transport::{decode_transport, encode_transport};
use crate::types::{EncryptedPayload, AES_KEY_LENGTH};

/// Symmetric envelope encryption keyed by the application secret.
///
/// Holds only the derived KEK. Raw DEKs live in zeroizing buffers for the
/// duration of one call and are never returned.
pub struct CryptoEnvelope {
    kek: Zeroizing<[u8; AES_KEY_LENGTH]>,
}

impl CryptoEnvelope {
    /// Build from the application secret (derives the key-wrap KEK).
    pub fn new(secret: &AppSecret) -> Result<Self, CryptoError> {
        Ok(Self {
            kek: secret.key_wrap_key()?,
        })
    }

    /// Encrypt `plaintext` under a fresh random key and IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError> {
        let dek = generate_dek()?;
        let iv = generate_iv()?;
        let ciphertext = aes_gcm_encrypt(dek.as_slice(), &iv, plaintext)?;
        let wrapped_key = wrap_dek(dek.as_slice(), self.kek.as_slice())?;
        Ok(EncryptedPayload {
            ciphertext,
            wrapped_key: wrapped_key.to_vec(),
            iv: iv.to_vec(),
        })
    }

    /// Unwrap the key and decrypt. Never returns partial plaintext.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        wrapped_key: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let dek = unwrap_dek(wrapped_key, self.kek.as_slice())?;
        aes_gcm_decrypt(&dek, iv, ciphertext)
    }

    /// Convenience for [`EncryptedPayload`] values.
    pub fn decrypt_payload(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(&payload.ciphertext, &payload.wrapped_key, &payload.iv)
    }

    /// Encrypt and return the colon-delimited transport string.
    pub fn encrypt_to_transport(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        Ok(encode_transport(&self.encrypt(plaintext)?))
    }

    /// Decode a transport string and decrypt it.
    pub fn decrypt_transport(&self, encoded: &str) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_payload(&decode_transport(encoded)?)
    }
}

impl std::fmt::Debug for CryptoEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CryptoEnvelope { .. }")
    }
}
