//! # memoir-core
//!
//! Client-side vault for Memoir:
//! - PBKDF2-HMAC-SHA256 key derivation from a master key file
//! - Per-field AES-256-CBC (or AES-256-GCM) credential encryption
//! - Session lock state with an idle timeout
//! - Local token and master-key storage (OS keychain or JSON file)
//! - Credential CRUD, re-encryption and export over a pluggable backend

pub mod backend;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod session;
pub mod settings;
pub mod storage;
mod vault;

pub use backend::{AuthGrant, Authenticator, CredentialBackend, InMemoryBackend};
pub use credential::{
    mask_password, Credential, CredentialCodec, CredentialDraft, CredentialManager, CredentialView,
    DecryptStatus, ExportedCredential, Page, ReEncryptReport, RecordStrategy, RemoteCredential,
};
pub use crypto::{CipherSuite, DerivedKey, EncryptedField, MasterSecret, SaltPolicy};
pub use error::{MemoirError, Result};
pub use session::{KeyHolder, LockTimer, Session, SessionState};
pub use settings::{Settings, SettingsManager};
pub use storage::{FileStorage, KeychainStorage, MasterKeyFileStore, SecureStorage, TokenStore};
pub use vault::Vault;
