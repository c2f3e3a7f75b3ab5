//! Credential type definitions

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::EncryptedField;

/// Shown in place of a field that could not be decrypted
pub const DECRYPT_ERROR_PLACEHOLDER: &str = "[Error decrypting]";

/// Shown in place of a sensitive field that arrived without an IV
pub const NO_IV_PLACEHOLDER: &str = "[No IV]";

/// Credential as stored by the backend (ciphertext and IVs only)
///
/// Field names follow the backend's JSON: `company`/`iv1` hold the
/// organization, `senha`/`iv2` the password and `email`/`iv3` the email.
/// Whole-blob deployments carry everything in `encryptedData` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCredential {
    pub uuid: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub senha: Option<String>,
    #[serde(default)]
    pub favoritos: bool,
    #[serde(default)]
    pub iv1: Option<String>,
    #[serde(default)]
    pub iv2: Option<String>,
    #[serde(default)]
    pub iv3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<EncryptedField>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Request body for create and update calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
    /// Set for updates, absent for creates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
    pub favoritos: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<EncryptedField>,
}

/// One page of a paginated backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Transform the items of a page, keeping its position metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Plaintext credential - automatically zeroed when dropped
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[zeroize(skip)]
    pub id: String,
    pub organization: String,
    pub password: String,
    pub email: Option<String>,
    #[zeroize(skip)]
    pub favorite: bool,
    #[zeroize(skip)]
    pub created_at: Option<String>,
    #[zeroize(skip)]
    pub updated_at: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("organization", &self.organization)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .field("favorite", &self.favorite)
            .finish()
    }
}

/// User input for creating or replacing a credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDraft {
    pub organization: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[zeroize(skip)]
    pub favorite: bool,
}

impl CredentialDraft {
    /// Create a draft with surrounding whitespace stripped from every field
    pub fn new(organization: &str, password: &str, email: Option<&str>, favorite: bool) -> Self {
        Self {
            organization: organization.trim().to_string(),
            password: password.trim().to_string(),
            email: email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            favorite,
        }
    }
}

impl From<&Credential> for CredentialDraft {
    fn from(credential: &Credential) -> Self {
        Self {
            organization: credential.organization.clone(),
            password: credential.password.clone(),
            email: credential.email.clone(),
            favorite: credential.favorite,
        }
    }
}

impl std::fmt::Debug for CredentialDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialDraft")
            .field("organization", &self.organization)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Sensitive attributes sealed together under whole-blob encryption
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct BlobContent {
    pub organization: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// How a listed record came out of decryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecryptStatus {
    /// All encrypted fields opened with the current key
    Decrypted,
    /// Record predates encryption; unencrypted fields were passed through
    LegacyPlaintext,
    /// Record could not be decrypted and carries placeholders
    Failed,
}

/// A credential prepared for display
#[derive(Debug, Clone)]
pub struct CredentialView {
    pub credential: Credential,
    pub status: DecryptStatus,
}

impl CredentialView {
    /// Placeholder view for a record that failed to decrypt
    pub fn failed(remote: &RemoteCredential) -> Self {
        Self {
            credential: Credential {
                id: remote.uuid.clone(),
                organization: DECRYPT_ERROR_PLACEHOLDER.to_string(),
                password: DECRYPT_ERROR_PLACEHOLDER.to_string(),
                email: None,
                favorite: remote.favoritos,
                created_at: remote.created_at.clone(),
                updated_at: remote.updated_at.clone(),
            },
            status: DecryptStatus::Failed,
        }
    }
}

/// Mask a password for display: one dot per character, eight when empty
pub fn mask_password(password: &str) -> String {
    let count = password.chars().count();
    "●".repeat(if count > 0 { count } else { 8 })
}
