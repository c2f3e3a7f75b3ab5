//! Cryptographic primitives for credential protection
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation from a master secret
//! - AES-256-CBC field encryption (wire compatible with existing data)
//! - AES-256-GCM field encryption for authenticated deployments
//! - Local wrapping of the master-key file
//! - Secure memory handling with zeroize

mod aead;
mod at_rest;
mod encryption;
mod key_derivation;
mod secure_memory;
mod suite;

pub use aead::{open_field, seal_field};
pub use at_rest::{decrypt_file_content, encrypt_file_content};
pub use encryption::{decrypt, decrypt_field, encrypt, encrypt_field, EncryptedField, IV_LENGTH};
pub use key_derivation::{
    derive_key, derive_master_key, derive_master_key_async, KeyDerivationParams, Salt, SaltPolicy,
    PBKDF2_ITERATIONS,
};
pub use secure_memory::{DerivedKey, MasterSecret, KEY_LENGTH};
pub use suite::CipherSuite;
