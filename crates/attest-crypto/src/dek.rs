//! Per-payload Data Encryption Key (DEK) primitives.
//!
//! Each stored payload gets a random 256-bit DEK. The payload is encrypted with
//! the DEK, and the DEK is wrapped (encrypted) with the application KEK using
//! AES-KW (RFC 3394).
//!
//! Wrapped DEK format: AES-KW(KEK, DEK) = 40 bytes.

use aes_kw::KekAes256;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// Size of a wrapped DEK in bytes: AES-KW adds one 8-byte block to a 32-byte key.
pub const WRAPPED_DEK_SIZE: usize = 40;

/// Generate a random 256-bit Data Encryption Key.
pub fn generate_dek() -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
    let mut dek = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    getrandom::getrandom(dek.as_mut_slice())
        .map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(dek)
}

fn kek_from(kek: &[u8]) -> Result<KekAes256, CryptoError> {
    let kek_array: [u8; AES_KEY_LENGTH] =
        kek.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: kek.len(),
        })?;
    Ok(KekAes256::from(kek_array))
}

/// Wrap a DEK with a KEK using AES-KW.
pub fn wrap_dek(dek: &[u8], kek: &[u8]) -> Result<[u8; WRAPPED_DEK_SIZE], CryptoError> {
    if dek.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: dek.len(),
        });
    }
    let kek_key = kek_from(kek)?;
    let mut wrapped = [0u8; WRAPPED_DEK_SIZE];
    kek_key
        .wrap(dek, &mut wrapped)
        .map_err(|e| CryptoError::WrapFailed(format!("{:?}", e)))?;
    Ok(wrapped)
}

/// Unwrap a DEK. Fails if the KEK is wrong or the wrapped bytes were altered
/// (AES-KW carries its own integrity check).
pub fn unwrap_dek(wrapped_dek: &[u8], kek: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped_dek.len() != WRAPPED_DEK_SIZE {
        return Err(CryptoError::InvalidWrappedKeyLength {
            expected: WRAPPED_DEK_SIZE,
            got: wrapped_dek.len(),
        });
    }
    let kek_key = kek_from(kek)?;
    let mut dek = Zeroizing::new(vec![0u8; AES_KEY_LENGTH]);
    kek_key
        .unwrap(wrapped_dek, &mut dek)
        .map_err(|e| CryptoError::UnwrapFailed(format!("{:?}", e)))?;
    Ok(dek)
}
