//! Crypto core: envelope encryption, checksums, canonical JSON, HMAC signing.

pub mod aes_gcm;
pub mod canonical;
pub mod checksum;
pub mod dek;
pub mod envelope;
pub mod error;
pub mod hkdf;
pub mod secret;
pub mod signing;
pub mod transport;
pub mod types;

pub use canonical::canonical_json;
pub use checksum::{checksum, ensure_checksum, verify_checksum};
pub use dek::WRAPPED_DEK_SIZE;
pub use envelope::CryptoEnvelope;
pub use error::{CryptoError, IntegrityError};
pub use secret::AppSecret;
pub use signing::Signer;
pub use transport::{decode_transport, encode_transport};
pub use types::{EncryptedPayload, AES_GCM_IV_LENGTH, AES_KEY_LENGTH};
