//! Record-level encryption of credentials
//!
//! A deployment encrypts credentials either field by field (each sensitive
//! attribute with its own IV) or as one sealed JSON blob. The codec applies
//! exactly one strategy and refuses records written with the other.

use serde::{Deserialize, Serialize};

use super::types::{
    BlobContent, Credential, CredentialDraft, CredentialPayload, CredentialView, DecryptStatus,
    RemoteCredential, NO_IV_PLACEHOLDER,
};
use crate::crypto::{CipherSuite, DerivedKey, EncryptedField};
use crate::error::{MemoirError, Result};

/// How credential records are laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RecordStrategy {
    /// `company`/`senha`/`email` encrypted independently (`iv1`/`iv2`/`iv3`)
    #[default]
    PerField,
    /// `{organization, password, email}` serialized and sealed as `encryptedData`
    WholeBlob,
}

/// Encrypts drafts into payloads and decrypts backend records
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialCodec {
    strategy: RecordStrategy,
    suite: CipherSuite,
}

impl CredentialCodec {
    /// Create a codec for a deployment's strategy and cipher suite
    pub fn new(strategy: RecordStrategy, suite: CipherSuite) -> Self {
        Self { strategy, suite }
    }

    /// Encrypt a draft for submission
    ///
    /// Every call draws fresh IVs, including re-encryption of an unchanged
    /// record on update.
    pub fn encrypt_record(
        &self,
        draft: &CredentialDraft,
        key: &DerivedKey,
        uuid: Option<&str>,
    ) -> Result<CredentialPayload> {
        if draft.organization.trim().is_empty() {
            return Err(MemoirError::InvalidCredential("organization must not be empty".to_string()));
        }
        if draft.password.trim().is_empty() {
            return Err(MemoirError::InvalidCredential("password must not be empty".to_string()));
        }

        let mut payload = CredentialPayload {
            uuid: uuid.map(str::to_string),
            company: None,
            email: None,
            senha: None,
            favoritos: draft.favorite,
            iv1: None,
            iv2: None,
            iv3: None,
            encrypted_data: None,
        };

        match self.strategy {
            RecordStrategy::PerField => {
                let company = self.suite.encrypt_field(&draft.organization, key)?;
                let senha = self.suite.encrypt_field(&draft.password, key)?;

                payload.company = Some(company.ciphertext);
                payload.iv1 = Some(company.iv);
                payload.senha = Some(senha.ciphertext);
                payload.iv2 = Some(senha.iv);

                if let Some(email) = draft.email.as_deref().filter(|e| !e.is_empty()) {
                    let email = self.suite.encrypt_field(email, key)?;
                    payload.email = Some(email.ciphertext);
                    payload.iv3 = Some(email.iv);
                }
            }
            RecordStrategy::WholeBlob => {
                let blob = BlobContent {
                    organization: draft.organization.clone(),
                    password: draft.password.clone(),
                    email: draft.email.clone(),
                };
                let json = zeroize::Zeroizing::new(serde_json::to_string(&blob)?);
                payload.encrypted_data = Some(self.suite.encrypt_field(&json, key)?);
            }
        }

        Ok(payload)
    }

    /// Move a record's encrypted fields from `old_key` to `new_key`
    ///
    /// Fields stored without an IV are carried over unchanged, so a record
    /// that mixes encrypted and plaintext attributes keeps its shape. Returns
    /// `None` when the record has no encrypted field at all.
    pub fn re_encrypt_record(
        &self,
        remote: &RemoteCredential,
        old_key: &DerivedKey,
        new_key: &DerivedKey,
    ) -> Result<Option<CredentialPayload>> {
        self.decrypt_record(remote, old_key)?;

        let mut payload = CredentialPayload {
            uuid: Some(remote.uuid.clone()),
            company: remote.company.clone(),
            email: remote.email.clone(),
            senha: remote.senha.clone(),
            favoritos: remote.favoritos,
            iv1: remote.iv1.clone(),
            iv2: remote.iv2.clone(),
            iv3: remote.iv3.clone(),
            encrypted_data: remote.encrypted_data.clone(),
        };
        let mut sealed = false;

        match self.strategy {
            RecordStrategy::PerField => {
                if let Some(field) = self.reseal(&remote.company, &remote.iv1, old_key, new_key)? {
                    payload.company = Some(field.ciphertext);
                    payload.iv1 = Some(field.iv);
                    sealed = true;
                }
                if let Some(field) = self.reseal(&remote.senha, &remote.iv2, old_key, new_key)? {
                    payload.senha = Some(field.ciphertext);
                    payload.iv2 = Some(field.iv);
                    sealed = true;
                }
                if let Some(field) = self.reseal(&remote.email, &remote.iv3, old_key, new_key)? {
                    payload.email = Some(field.ciphertext);
                    payload.iv3 = Some(field.iv);
                    sealed = true;
                }
            }
            RecordStrategy::WholeBlob => {
                if let Some(field) = &remote.encrypted_data {
                    let json = zeroize::Zeroizing::new(self.suite.decrypt_field(field, old_key)?);
                    payload.encrypted_data = Some(self.suite.encrypt_field(&json, new_key)?);
                    sealed = true;
                }
            }
        }

        Ok(sealed.then_some(payload))
    }

    fn reseal(
        &self,
        value: &Option<String>,
        iv: &Option<String>,
        old_key: &DerivedKey,
        new_key: &DerivedKey,
    ) -> Result<Option<EncryptedField>> {
        match self.open_optional(value, iv, old_key)? {
            Some(plaintext) => {
                let plaintext = zeroize::Zeroizing::new(plaintext);
                self.suite.encrypt_field(&plaintext, new_key).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Decrypt a backend record, failing on any field that does not open
    ///
    /// Records without IVs predate encryption: their unencrypted attributes are
    /// passed through and reported as `DecryptStatus::LegacyPlaintext`, and a
    /// password without an IV is shown as `[No IV]` rather than trusted.
    pub fn decrypt_record(&self, remote: &RemoteCredential, key: &DerivedKey) -> Result<CredentialView> {
        match self.strategy {
            RecordStrategy::PerField => self.decrypt_fields(remote, key),
            RecordStrategy::WholeBlob => self.decrypt_blob(remote, key),
        }
    }

    /// Decrypt a record for display, substituting placeholders on failure
    ///
    /// One corrupted record must not block the rest of a list, so errors are
    /// logged and turned into a `DecryptStatus::Failed` view.
    pub fn render(&self, remote: &RemoteCredential, key: &DerivedKey) -> CredentialView {
        match self.decrypt_record(remote, key) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!("Failed to decrypt credential {}: {}", remote.uuid, e);
                CredentialView::failed(remote)
            }
        }
    }

    fn decrypt_fields(&self, remote: &RemoteCredential, key: &DerivedKey) -> Result<CredentialView> {
        if remote.encrypted_data.is_some() {
            return Err(MemoirError::DecryptionError(format!(
                "Credential {} is blob-encrypted but this deployment encrypts per field",
                remote.uuid
            )));
        }

        let mut legacy = false;

        let organization = match self.open_optional(&remote.company, &remote.iv1, key)? {
            Some(value) => value,
            None => {
                legacy = true;
                remote.company.clone().unwrap_or_default()
            }
        };

        let password = match self.open_optional(&remote.senha, &remote.iv2, key)? {
            Some(value) => value,
            None => {
                legacy = true;
                NO_IV_PLACEHOLDER.to_string()
            }
        };

        let email = match self.open_optional(&remote.email, &remote.iv3, key)? {
            Some(value) => Some(value),
            None => {
                if remote.email.as_deref().is_some_and(|e| !e.is_empty()) {
                    legacy = true;
                }
                remote.email.clone().filter(|e| !e.is_empty())
            }
        };

        Ok(CredentialView {
            credential: Credential {
                id: remote.uuid.clone(),
                organization,
                password,
                email,
                favorite: remote.favoritos,
                created_at: remote.created_at.clone(),
                updated_at: remote.updated_at.clone(),
            },
            status: if legacy {
                DecryptStatus::LegacyPlaintext
            } else {
                DecryptStatus::Decrypted
            },
        })
    }

    fn decrypt_blob(&self, remote: &RemoteCredential, key: &DerivedKey) -> Result<CredentialView> {
        if remote.iv1.is_some() || remote.iv2.is_some() || remote.iv3.is_some() {
            return Err(MemoirError::DecryptionError(format!(
                "Credential {} is field-encrypted but this deployment uses whole-blob encryption",
                remote.uuid
            )));
        }

        let (organization, password, email, status) = match &remote.encrypted_data {
            Some(field) => {
                let json = zeroize::Zeroizing::new(self.suite.decrypt_field(field, key)?);
                let blob: BlobContent = serde_json::from_str(&json).map_err(|e| {
                    MemoirError::DecryptionError(format!("Decrypted blob is not a credential: {}", e))
                })?;
                (
                    blob.organization.clone(),
                    blob.password.clone(),
                    blob.email.clone(),
                    DecryptStatus::Decrypted,
                )
            }
            None => (
                remote.company.clone().unwrap_or_default(),
                NO_IV_PLACEHOLDER.to_string(),
                remote.email.clone().filter(|e| !e.is_empty()),
                DecryptStatus::LegacyPlaintext,
            ),
        };

        Ok(CredentialView {
            credential: Credential {
                id: remote.uuid.clone(),
                organization,
                password,
                email,
                favorite: remote.favoritos,
                created_at: remote.created_at.clone(),
                updated_at: remote.updated_at.clone(),
            },
            status,
        })
    }

    /// Open a ciphertext/IV pair; `None` when the IV is missing
    fn open_optional(
        &self,
        value: &Option<String>,
        iv: &Option<String>,
        key: &DerivedKey,
    ) -> Result<Option<String>> {
        let iv = match iv.as_deref().filter(|iv| !iv.is_empty()) {
            Some(iv) => iv,
            None => return Ok(None),
        };

        let ciphertext = value.as_deref().ok_or_else(|| {
            MemoirError::DecryptionError("IV present but ciphertext missing".to_string())
        })?;

        let field = EncryptedField::new(ciphertext, iv);
        self.suite.decrypt_field(&field, key).map(Some)
    }
}
