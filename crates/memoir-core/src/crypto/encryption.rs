//! AES-256-CBC field encryption
//!
//! Wire format of an encrypted field:
//! - `ciphertext`: standard base64 of the PKCS#7-padded CBC ciphertext
//! - `iv`: lower-case hex of the 16-byte IV
//!
//! CBC carries no authentication tag. A wrong key or a modified ciphertext is
//! caught only when the padding or the UTF-8 check fails, which is very likely
//! but not guaranteed. `CipherSuite::Aes256Gcm` closes that gap for
//! deployments that do not need to read existing CBC data.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::DerivedKey;
use crate::error::{MemoirError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length in bytes (one AES block)
pub const IV_LENGTH: usize = 16;

const BLOCK_SIZE: usize = 16;

/// One encrypted attribute: ciphertext plus the IV it was produced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Base64-encoded ciphertext
    pub ciphertext: String,
    /// Hex-encoded 16-byte IV
    pub iv: String,
}

impl EncryptedField {
    /// Build a field from its transport strings
    pub fn new(ciphertext: impl Into<String>, iv: impl Into<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            iv: iv.into(),
        }
    }

    pub(crate) fn from_raw(ciphertext: &[u8], iv: &[u8; IV_LENGTH]) -> Self {
        Self {
            ciphertext: STANDARD.encode(ciphertext),
            iv: hex::encode(iv),
        }
    }

    /// Decode and validate the IV
    pub fn iv_bytes(&self) -> Result<[u8; IV_LENGTH]> {
        let bytes = hex::decode(self.iv.trim())
            .map_err(|e| MemoirError::DecryptionError(format!("Invalid IV hex: {}", e)))?;

        bytes.as_slice().try_into().map_err(|_| {
            MemoirError::DecryptionError(format!(
                "Invalid IV length: expected {}, got {}",
                IV_LENGTH,
                bytes.len()
            ))
        })
    }

    /// Decode the ciphertext
    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.ciphertext.trim())
            .map_err(|e| MemoirError::DecryptionError(format!("Invalid ciphertext base64: {}", e)))
    }
}

/// Draw a fresh IV from the OS CSPRNG
pub(crate) fn generate_iv() -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt raw bytes with AES-256-CBC and PKCS#7 padding
pub fn encrypt(plaintext: &[u8], key: &DerivedKey, iv: &[u8; IV_LENGTH]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| MemoirError::EncryptionError(e.to_string()))?;

    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt raw AES-256-CBC ciphertext and strip PKCS#7 padding
pub fn decrypt(ciphertext: &[u8], key: &DerivedKey, iv: &[u8; IV_LENGTH]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(MemoirError::DecryptionError(format!(
            "Ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| MemoirError::DecryptionError(e.to_string()))?;

    cipher.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| {
        MemoirError::DecryptionError("Invalid padding - wrong key or corrupted data".to_string())
    })
}

/// Encrypt a string field under a fresh random IV
pub fn encrypt_field(plaintext: &str, key: &DerivedKey) -> Result<EncryptedField> {
    let iv = generate_iv();
    let ciphertext = encrypt(plaintext.as_bytes(), key, &iv)?;
    Ok(EncryptedField::from_raw(&ciphertext, &iv))
}

/// Decrypt a string field
///
/// Fails with `DecryptionError` when the field cannot be parsed, the padding
/// is invalid, or the plaintext is not non-empty UTF-8.
pub fn decrypt_field(field: &EncryptedField, key: &DerivedKey) -> Result<String> {
    let iv = field.iv_bytes()?;
    let ciphertext = field.ciphertext_bytes()?;
    let plaintext = decrypt(&ciphertext, key, &iv)?;
    into_plaintext(plaintext)
}

/// Validate decrypted bytes as a non-empty UTF-8 string
pub(crate) fn into_plaintext(bytes: Vec<u8>) -> Result<String> {
    let plaintext = String::from_utf8(bytes)
        .map_err(|_| MemoirError::DecryptionError("Invalid UTF-8 - wrong key or corrupted data".to_string()))?;

    if plaintext.is_empty() {
        return Err(MemoirError::DecryptionError(
            "Empty plaintext - wrong key or corrupted data".to_string(),
        ));
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> DerivedKey {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        DerivedKey::new(key)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();

        for plaintext in ["Gmail", "p@ssw0rd!", "exactly 16 bytes", "ünïcødé ✓ 密码"] {
            let encrypted = encrypt_field(plaintext, &key).unwrap();
            let decrypted = decrypt_field(&encrypted, &key).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_field_encoding() {
        let key = test_key();
        let encrypted = encrypt_field("Gmail", &key).unwrap();

        assert_eq!(encrypted.iv.len(), IV_LENGTH * 2);
        assert!(encrypted.iv.chars().all(|c| c.is_ascii_hexdigit()));
        // One block of ciphertext for a 5-byte plaintext
        assert_eq!(encrypted.ciphertext_bytes().unwrap().len(), 16);
    }

    #[test]
    fn test_raw_cipher_is_deterministic_for_fixed_iv() {
        let key = DerivedKey::new(core::array::from_fn(|i| i as u8));
        let iv: [u8; 16] = core::array::from_fn(|i| i as u8);

        let ciphertext1 = encrypt(b"Gmail", &key, &iv).unwrap();
        let ciphertext2 = encrypt(b"Gmail", &key, &iv).unwrap();
        assert_eq!(ciphertext1, ciphertext2);
        assert_eq!(ciphertext1.len(), 16);

        let plaintext = decrypt(&ciphertext1, &key, &iv).unwrap();
        assert_eq!(plaintext, b"Gmail");
    }

    #[test]
    fn test_fresh_iv_every_encryption() {
        let key = test_key();

        let encrypted1 = encrypt_field("same plaintext", &key).unwrap();
        let encrypted2 = encrypt_field("same plaintext", &key).unwrap();

        assert_ne!(encrypted1.iv, encrypted2.iv);
        assert_ne!(encrypted1.ciphertext, encrypted2.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let key1 = test_key();
        let key2 = test_key();

        let encrypted = encrypt_field("secret data", &key1).unwrap();
        let result = decrypt_field(&encrypted, &key2);

        assert!(matches!(result, Err(MemoirError::DecryptionError(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let key = test_key();
        // 20 bytes: second block ends in twelve 0x0c padding bytes
        let encrypted = encrypt_field("twenty bytes of text", &key).unwrap();

        let mut ciphertext = encrypted.ciphertext_bytes().unwrap();
        assert_eq!(ciphertext.len(), 32);
        // Flipping a bit in block one flips the same bit of block two's plaintext,
        // turning the final padding byte into 0x4c
        ciphertext[15] ^= 0x40;

        let tampered = EncryptedField::from_raw(&ciphertext, &encrypted.iv_bytes().unwrap());
        let result = decrypt_field(&tampered, &key);

        assert!(matches!(result, Err(MemoirError::DecryptionError(_))));
    }

    #[test]
    fn test_tampered_iv_fails_decryption() {
        let key = test_key();
        let encrypted = encrypt_field("Gmail", &key).unwrap();

        let mut iv = encrypted.iv_bytes().unwrap();
        iv[15] ^= 0x20;

        let tampered = EncryptedField::from_raw(&encrypted.ciphertext_bytes().unwrap(), &iv);
        assert!(decrypt_field(&tampered, &key).is_err());
    }

    #[test]
    fn test_malformed_fields_fail_without_panicking() {
        let key = test_key();
        let good = encrypt_field("Gmail", &key).unwrap();

        let bad_iv_hex = EncryptedField::new(good.ciphertext.clone(), "not-hex");
        let short_iv = EncryptedField::new(good.ciphertext.clone(), "00112233");
        let bad_base64 = EncryptedField::new("***", good.iv.clone());
        let empty = EncryptedField::new("", good.iv.clone());
        let partial_block = EncryptedField::new(STANDARD.encode([1u8; 10]), good.iv.clone());

        for field in [bad_iv_hex, short_iv, bad_base64, empty, partial_block] {
            assert!(matches!(
                decrypt_field(&field, &key),
                Err(MemoirError::DecryptionError(_))
            ));
        }
    }

    #[test]
    fn test_empty_plaintext_is_rejected() {
        let key = test_key();
        let encrypted = encrypt_field("", &key).unwrap();

        assert!(matches!(
            decrypt_field(&encrypted, &key),
            Err(MemoirError::DecryptionError(_))
        ));
    }
}
