//! Main vault orchestration
//!
//! Ties the backend login, the device copy of the master key file, the
//! session lock state and the credential manager together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{Authenticator, CredentialBackend};
use crate::credential::{
    export_json, write_export, Credential, CredentialCodec, CredentialDraft, CredentialManager,
    CredentialView, Page, ReEncryptReport,
};
use crate::crypto::{derive_master_key_async, DerivedKey, MasterSecret, SaltPolicy};
use crate::error::{MemoirError, Result};
use crate::session::{Session, SessionState};
use crate::settings::Settings;
use crate::storage::{MasterKeyFileStore, SecureStorage, TokenStore};

/// Main vault struct that orchestrates all functionality
pub struct Vault {
    session: Arc<Session>,
    tokens: TokenStore,
    master_key_file: MasterKeyFileStore,
    credentials: CredentialManager,
    authenticator: Arc<dyn Authenticator>,
    salt_policy: SaltPolicy,
}

impl Vault {
    /// Create a vault over local storage and a remote backend
    pub fn new(
        storage: Arc<dyn SecureStorage>,
        backend: Arc<dyn CredentialBackend>,
        authenticator: Arc<dyn Authenticator>,
        settings: &Settings,
    ) -> Self {
        let session = Arc::new(Session::new(settings.auto_lock_timeout_minutes));
        let codec = CredentialCodec::new(settings.record_strategy, settings.cipher_suite);
        let credentials = CredentialManager::new(backend, session.key_holder(), codec)
            .with_page_size(settings.page_size);

        debug!(
            "Vault configured: {:?} salt, {:?}, {:?} records",
            settings.salt_policy, settings.cipher_suite, settings.record_strategy
        );

        Self {
            session,
            tokens: TokenStore::new(storage.clone()),
            master_key_file: MasterKeyFileStore::new(storage),
            credentials,
            authenticator,
            salt_policy: settings.salt_policy,
        }
    }

    /// Shared session, for the idle watchdog and activity tracking
    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Get the current lock state
    pub async fn state(&self) -> SessionState {
        self.session.state().await
    }

    /// Pick up a stored, unexpired token from an earlier run
    pub async fn restore_login(&self) -> Result<bool> {
        if self.tokens.get_token().await?.is_none() {
            return Ok(false);
        }

        if self.tokens.is_token_expired().await? {
            info!("Stored token has expired");
            self.tokens.remove_token().await?;
            return Ok(false);
        }

        self.session.mark_logged_in().await;
        Ok(true)
    }

    /// Log in to the backend; the vault stays locked until a key is supplied
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let grant = self.authenticator.login(username, password).await?;

        self.tokens
            .save_token(&grant.token, grant.salt.as_deref(), TokenStore::default_expiry())
            .await?;
        self.session.mark_logged_in().await;

        info!("Logged in as {}", grant.username.as_deref().unwrap_or(username));
        Ok(())
    }

    /// Forget the token and the key
    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await;
        self.tokens.remove_token().await?;
        Ok(())
    }

    /// Drop the key, keep the login
    pub async fn lock(&self) {
        self.session.lock().await;
    }

    /// Whether this device holds a copy of the master key file
    pub async fn has_master_key_file(&self) -> Result<bool> {
        self.master_key_file.exists().await
    }

    /// First run: keep a wrapped copy of the master key file, then unlock with it
    pub async fn setup_master_key_file(&self, content: &str) -> Result<()> {
        let secret = MasterSecret::new(content)?;
        self.ensure_logged_in().await?;

        self.master_key_file.save(&secret).await?;
        self.unlock_with_secret(secret).await
    }

    /// Remove the copy kept on this device and lock
    ///
    /// Credentials stay on the backend; the same master key file unlocks them
    /// again once it is registered anew.
    pub async fn forget_master_key_file(&self) -> Result<()> {
        self.master_key_file.remove().await?;
        self.session.lock().await;

        info!("Master key file removed from this device");
        Ok(())
    }

    /// Unlock with master key file content supplied by the user
    pub async fn unlock_with_master_key_file(&self, content: &str) -> Result<()> {
        let secret = MasterSecret::new(content)?;
        self.unlock_with_secret(secret).await
    }

    /// Unlock with the copy stored on this device
    pub async fn unlock_with_stored_master_key_file(&self) -> Result<()> {
        let secret = self.master_key_file.load().await?;
        self.unlock_with_secret(secret).await
    }

    /// Replace the master key file and migrate every credential to the new key
    ///
    /// The stored file and the session key only change once every record has
    /// been rewritten; otherwise `ReEncryptionIncomplete` is returned and the
    /// call can be repeated to finish the migration.
    pub async fn change_master_key_file(&self, new_content: &str) -> Result<ReEncryptReport> {
        let new_secret = MasterSecret::new(new_content)?;
        let old_key = self.session.key_holder().snapshot().await?;
        let new_key = self.derive(new_secret.clone()).await?;

        let report = self.credentials.re_encrypt_all(&old_key, &new_key).await?;
        if !report.is_complete() {
            warn!("Master key change left {} credentials on the old key", report.failed.len());
            return Err(MemoirError::ReEncryptionIncomplete {
                failed: report.failed.len(),
                total: report.total,
            });
        }

        self.master_key_file.save(&new_secret).await?;
        self.session.rotate_key(new_key).await?;

        info!("Master key file changed");
        Ok(report)
    }

    pub async fn list_page(&self, page: u32) -> Result<Page<CredentialView>> {
        self.session.touch().await;
        self.credentials.list_page(page).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<CredentialView>> {
        self.session.touch().await;
        self.credentials.fetch_all().await
    }

    pub async fn create_credential(&self, draft: &CredentialDraft) -> Result<Credential> {
        self.session.touch().await;
        self.credentials.create(draft).await
    }

    pub async fn update_credential(&self, id: &str, draft: &CredentialDraft) -> Result<Credential> {
        self.session.touch().await;
        self.credentials.update(id, draft).await
    }

    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<Credential> {
        self.session.touch().await;
        self.credentials.set_favorite(id, favorite).await
    }

    pub async fn delete_credential(&self, id: &str) -> Result<()> {
        self.ensure_unlocked().await?;
        self.session.touch().await;
        self.credentials.delete(id).await
    }

    /// Decrypt everything and return it as pretty-printed JSON
    pub async fn export_json(&self) -> Result<String> {
        self.session.touch().await;
        export_json(&self.credentials).await
    }

    /// Decrypt everything and write it into `dir`
    pub async fn export_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        self.session.touch().await;
        write_export(&self.credentials, dir).await
    }

    async fn unlock_with_secret(&self, secret: MasterSecret) -> Result<()> {
        self.ensure_logged_in().await?;

        let key = self.derive(secret).await?;
        self.session.unlock(key).await
    }

    async fn derive(&self, secret: MasterSecret) -> Result<DerivedKey> {
        let server_salt = match self.salt_policy {
            SaltPolicy::ServerIssued => Some(
                self.tokens
                    .get_salt()
                    .await?
                    .ok_or(MemoirError::NotAuthenticated)?,
            ),
            SaltPolicy::SelfDerived => None,
        };

        derive_master_key_async(secret, self.salt_policy, server_salt).await
    }

    async fn ensure_logged_in(&self) -> Result<()> {
        if self.session.state().await == SessionState::LoggedOut {
            return Err(MemoirError::NotAuthenticated);
        }
        Ok(())
    }

    async fn ensure_unlocked(&self) -> Result<()> {
        if !self.session.is_unlocked().await {
            return Err(MemoirError::VaultLocked);
        }
        Ok(())
    }
}
