//! Secure memory handling with automatic zeroization

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{MemoirError, Result};

/// Length of derived keys in bytes (256-bit)
pub const KEY_LENGTH: usize = 32;

/// Symmetric key derived from the master secret - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a derived key from raw bytes
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes (use carefully - avoid copying)
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl Clone for DerivedKey {
    fn clone(&self) -> Self {
        Self { key: self.key }
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.key[..].ct_eq(&other.key[..]).into()
    }
}

impl Eq for DerivedKey {}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// User-supplied master secret (master-key file content or password)
///
/// Held only in memory for as long as it is needed to derive a key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    value: String,
}

impl MasterSecret {
    /// Wrap a secret, rejecting empty or whitespace-only input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(MemoirError::InvalidSecret);
        }
        Ok(Self { value })
    }

    /// Get the secret exactly as supplied
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Get the secret with surrounding whitespace removed
    ///
    /// Master-key files picked from disk routinely carry a trailing newline;
    /// the trimmed form is what keys are derived from.
    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
