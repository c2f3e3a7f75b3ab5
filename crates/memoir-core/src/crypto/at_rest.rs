//! Local wrapping of the master-key file
//!
//! The master-key file content is kept on the device so a returning user can
//! be told apart from a first run. It is wrapped with AES-256-CBC under a key
//! computed from a passphrase compiled into the application.
//!
//! Anyone with the application binary can recover that passphrase, so this
//! only keeps the file from being readable at a glance in local storage. It
//! is not protection against a compromised device and must not be treated as
//! a security boundary.

use sha2::{Digest, Sha256};

use super::encryption::{decrypt_field, encrypt_field, EncryptedField};
use super::{DerivedKey, MasterSecret, KEY_LENGTH};
use crate::error::{MemoirError, Result};

const APP_STORAGE_PASSPHRASE: &str = "memoir/local-master-key-envelope/v1";

fn storage_key() -> DerivedKey {
    let digest = Sha256::digest(APP_STORAGE_PASSPHRASE.as_bytes());
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&digest);
    DerivedKey::new(key)
}

/// Wrap master-key file content into a JSON envelope for local storage
pub fn encrypt_file_content(content: &MasterSecret) -> Result<String> {
    let field = encrypt_field(content.expose(), &storage_key())?;
    Ok(serde_json::to_string(&field)?)
}

/// Unwrap a stored envelope back into the master-key file content
pub fn decrypt_file_content(envelope: &str) -> Result<MasterSecret> {
    let field: EncryptedField = serde_json::from_str(envelope).map_err(|e| {
        MemoirError::DecryptionError(format!("Malformed master key envelope: {}", e))
    })?;

    let content = decrypt_field(&field, &storage_key())?;
    MasterSecret::new(content)
}
