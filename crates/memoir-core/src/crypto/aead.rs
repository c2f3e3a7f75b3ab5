//! AES-256-GCM field encryption
//!
//! Uses a 16-byte nonce so an authenticated field keeps the same shape as a
//! CBC one (`ciphertext` base64, `iv` 32 hex chars). The 16-byte GCM tag is
//! appended to the ciphertext before encoding.

use aes_gcm::{
    aead::{consts::U16, Aead, KeyInit},
    aes::Aes256,
    AesGcm, Nonce,
};

use super::encryption::{generate_iv, into_plaintext, EncryptedField};
use super::DerivedKey;
use crate::error::{MemoirError, Result};

type Aes256Gcm16 = AesGcm<Aes256, U16>;

const TAG_LENGTH: usize = 16;

/// Encrypt a string field with AES-256-GCM under a fresh random nonce
pub fn seal_field(plaintext: &str, key: &DerivedKey) -> Result<EncryptedField> {
    let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
        .map_err(|e| MemoirError::EncryptionError(e.to_string()))?;

    let iv = generate_iv();
    let nonce = Nonce::<U16>::from_slice(&iv);

    let ciphertext_with_tag = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| MemoirError::EncryptionError(e.to_string()))?;

    Ok(EncryptedField::from_raw(&ciphertext_with_tag, &iv))
}

/// Decrypt and authenticate an AES-256-GCM field
pub fn open_field(field: &EncryptedField, key: &DerivedKey) -> Result<String> {
    let iv = field.iv_bytes()?;
    let ciphertext_with_tag = field.ciphertext_bytes()?;

    if ciphertext_with_tag.len() < TAG_LENGTH {
        return Err(MemoirError::DecryptionError(
            "Ciphertext shorter than authentication tag".to_string(),
        ));
    }

    let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
        .map_err(|e| MemoirError::DecryptionError(e.to_string()))?;
    let nonce = Nonce::<U16>::from_slice(&iv);

    let plaintext = cipher
        .decrypt(nonce, ciphertext_with_tag.as_slice())
        .map_err(|_| {
            MemoirError::DecryptionError(
                "Authentication failed - wrong key or tampered data".to_string(),
            )
        })?;

    into_plaintext(plaintext)
}
