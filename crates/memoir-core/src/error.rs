//! Error types for memoir-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, MemoirError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum MemoirError {
    #[error("Master secret is empty or whitespace")]
    InvalidSecret,

    #[error("Vault is locked - unlock with the master key file first")]
    VaultLocked,

    #[error("Not logged in - authenticate with the backend first")]
    NotAuthenticated,

    #[error("No master key file has been set up on this device")]
    MasterKeyFileMissing,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Failed to decrypt: {0}")]
    DecryptionError(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Keychain error: {0}")]
    KeychainError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("No credentials found to export")]
    NoCredentialsToExport,

    #[error("Re-encryption incomplete: {failed} of {total} credentials could not be migrated")]
    ReEncryptionIncomplete { failed: usize, total: usize },

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl MemoirError {
    /// Whether this error means the ciphertext could not be opened with the key at hand
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, MemoirError::DecryptionError(_))
    }
}
