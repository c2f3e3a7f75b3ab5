//! Per-deployment cipher selection

use serde::{Deserialize, Serialize};

use super::{aead, encryption, DerivedKey, EncryptedField};
use crate::error::Result;

/// Field cipher used by a deployment
///
/// Both suites produce the same `EncryptedField` shape, but they cannot read
/// each other's output; a deployment picks one and keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CipherSuite {
    /// AES-256-CBC + PKCS#7, compatible with existing backend data
    #[default]
    Aes256Cbc,
    /// AES-256-GCM with a 16-byte nonce; detects tampering
    Aes256Gcm,
}

impl CipherSuite {
    /// Encrypt one field under a fresh IV
    pub fn encrypt_field(self, plaintext: &str, key: &DerivedKey) -> Result<EncryptedField> {
        match self {
            CipherSuite::Aes256Cbc => encryption::encrypt_field(plaintext, key),
            CipherSuite::Aes256Gcm => aead::seal_field(plaintext, key),
        }
    }

    /// Decrypt one field
    pub fn decrypt_field(self, field: &EncryptedField, key: &DerivedKey) -> Result<String> {
        match self {
            CipherSuite::Aes256Cbc => encryption::decrypt_field(field, key),
            CipherSuite::Aes256Gcm => aead::open_field(field, key),
        }
    }
}
