/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Minimum accepted length of the application secret in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// HKDF salt shared by every key derived from the application secret.
pub(crate) const HKDF_SALT: &[u8] = b"attest:app-secret:v1";

/// HKDF info label for the key-encryption key that wraps per-payload keys.
pub(crate) const KEY_WRAP_INFO: &[u8] = b"attest:key-wrap";

/// HKDF info label for the audit-trail signing key.
pub(crate) const AUDIT_SIGNING_INFO: &[u8] = b"attest:audit-signature";

/// The result of encrypting one payload.
///
/// `wrapped_key` and `iv` are fresh for every call to
/// [`CryptoEnvelope::encrypt`](crate::CryptoEnvelope::encrypt); they are not
/// secret on their own and are stored next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// AES-256-GCM output (ciphertext + 16-byte tag).
    pub ciphertext: Vec<u8>,
    /// AES-KW(KEK, DEK): 40 bytes.
    pub wrapped_key: Vec<u8>,
    /// 12-byte GCM nonce.
    pub iv: Vec<u8>,
}
