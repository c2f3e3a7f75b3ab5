//! Credential manager for CRUD operations against a remote backend

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::codec::CredentialCodec;
use super::types::{
    Credential, CredentialDraft, CredentialView, DecryptStatus, Page, RemoteCredential,
};
use crate::backend::CredentialBackend;
use crate::crypto::DerivedKey;
use crate::error::{MemoirError, Result};
use crate::session::KeyHolder;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Outcome of migrating every credential to a new key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReEncryptReport {
    /// Records seen
    pub total: usize,
    /// Records rewritten under the new key by this run
    pub re_encrypted: usize,
    /// Records that already open with the new key (left by an earlier run)
    pub already_migrated: usize,
    /// Records without any encrypted field; left untouched
    pub legacy_skipped: usize,
    /// `(uuid, reason)` for records that could not be migrated
    pub failed: Vec<(String, String)>,
}

impl ReEncryptReport {
    /// Every record is now readable with the new key (legacy records aside)
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Credential manager
pub struct CredentialManager {
    /// Remote store
    backend: Arc<dyn CredentialBackend>,
    /// Session key, copied out per operation
    key: KeyHolder,
    codec: CredentialCodec,
    page_size: u32,
}

impl CredentialManager {
    /// Create a new credential manager
    pub fn new(backend: Arc<dyn CredentialBackend>, key: KeyHolder, codec: CredentialCodec) -> Self {
        Self {
            backend,
            key,
            codec,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use a different page size for listing and export
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetch and decrypt one page; undecryptable records carry placeholders
    pub async fn list_page(&self, page: u32) -> Result<Page<CredentialView>> {
        let key = self.key.snapshot().await?;
        let remote = self.backend.list(page, self.page_size).await?;

        debug!(
            "Listed page {} ({} of {} credentials)",
            page,
            remote.content.len(),
            remote.total_items
        );
        Ok(remote.map(|record| self.codec.render(&record, &key)))
    }

    /// Fetch and decrypt every credential across all pages
    pub async fn fetch_all(&self) -> Result<Vec<CredentialView>> {
        let key = self.key.snapshot().await?;
        let records = self.fetch_all_remote().await?;

        Ok(records
            .iter()
            .map(|record| self.codec.render(record, &key))
            .collect())
    }

    /// Walk every page of the backend listing
    pub(crate) async fn fetch_all_remote(&self) -> Result<Vec<RemoteCredential>> {
        let mut records = Vec::new();
        let mut page = 0;

        loop {
            let batch = self.backend.list(page, self.page_size).await?;
            let empty = batch.content.is_empty();
            records.extend(batch.content);

            if !batch.has_next || empty {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    /// Encrypt and store a new credential
    pub async fn create(&self, draft: &CredentialDraft) -> Result<Credential> {
        let key = self.key.snapshot().await?;
        let payload = self.codec.encrypt_record(draft, &key, None)?;
        let stored = self.backend.create(&payload).await?;

        info!("Created credential: {}", stored.uuid);
        Ok(Self::from_draft(draft, &stored))
    }

    /// Replace a credential with freshly encrypted fields
    pub async fn update(&self, id: &str, draft: &CredentialDraft) -> Result<Credential> {
        let key = self.key.snapshot().await?;
        let payload = self.codec.encrypt_record(draft, &key, Some(id))?;
        let stored = self.backend.update(&payload).await?;

        info!("Updated credential: {}", id);
        Ok(Self::from_draft(draft, &stored))
    }

    /// Mark or unmark a credential as favourite
    ///
    /// The backend replaces whole records, so the current record is decrypted
    /// and written back with the flag changed.
    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<Credential> {
        let key = self.key.snapshot().await?;
        let remote = self.find_remote(id).await?;

        let view = self.codec.decrypt_record(&remote, &key)?;
        if view.status != DecryptStatus::Decrypted {
            return Err(MemoirError::DecryptionError(format!(
                "Credential {} has unencrypted fields and cannot be rewritten",
                id
            )));
        }

        let mut draft = CredentialDraft::from(&view.credential);
        draft.favorite = favorite;

        self.update(id, &draft).await
    }

    /// Delete a credential
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend.delete(id).await?;

        info!("Deleted credential: {}", id);
        Ok(())
    }

    /// Rewrite every credential under `new_key`
    ///
    /// Only fields stored with an IV are re-encrypted; plaintext fields of
    /// partly encrypted records are written back as they were. Records are
    /// migrated one at a time, so an interrupted run leaves each record
    /// readable under either key. Records that already open with `new_key`
    /// are counted and skipped, which makes a re-run resume where the last
    /// one stopped.
    pub async fn re_encrypt_all(
        &self,
        old_key: &DerivedKey,
        new_key: &DerivedKey,
    ) -> Result<ReEncryptReport> {
        let records = self.fetch_all_remote().await?;
        let mut report = ReEncryptReport {
            total: records.len(),
            ..Default::default()
        };

        for remote in &records {
            match self.codec.re_encrypt_record(remote, old_key, new_key) {
                Ok(None) => {
                    debug!("Skipping legacy credential {}", remote.uuid);
                    report.legacy_skipped += 1;
                }
                Ok(Some(payload)) => match self.backend.update(&payload).await {
                    Ok(_) => report.re_encrypted += 1,
                    Err(e) => {
                        warn!("Failed to re-encrypt credential {}: {}", remote.uuid, e);
                        report.failed.push((remote.uuid.clone(), e.to_string()));
                    }
                },
                Err(e) if e.is_decryption_failure() => {
                    if self.codec.decrypt_record(remote, new_key).is_ok() {
                        report.already_migrated += 1;
                    } else {
                        warn!("Credential {} opens with neither key", remote.uuid);
                        report.failed.push((remote.uuid.clone(), e.to_string()));
                    }
                }
                Err(e) => {
                    report.failed.push((remote.uuid.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Re-encryption finished: {} rewritten, {} already migrated, {} legacy, {} failed",
            report.re_encrypted,
            report.already_migrated,
            report.legacy_skipped,
            report.failed.len()
        );
        Ok(report)
    }

    async fn find_remote(&self, id: &str) -> Result<RemoteCredential> {
        self.fetch_all_remote()
            .await?
            .into_iter()
            .find(|r| r.uuid == id)
            .ok_or_else(|| MemoirError::CredentialNotFound(id.to_string()))
    }

    fn from_draft(draft: &CredentialDraft, stored: &RemoteCredential) -> Credential {
        Credential {
            id: stored.uuid.clone(),
            organization: draft.organization.clone(),
            password: draft.password.clone(),
            email: draft.email.clone(),
            favorite: draft.favorite,
            created_at: stored.created_at.clone(),
            updated_at: stored.updated_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::credential::CredentialPayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::new([byte; 32])
    }

    async fn test_manager(backend: Arc<dyn CredentialBackend>) -> CredentialManager {
        let holder = KeyHolder::new();
        holder.set(key(1)).await;
        CredentialManager::new(backend, holder, CredentialCodec::default())
    }

    /// Backend that starts rejecting updates after a number of successes
    struct FlakyBackend {
        inner: InMemoryBackend,
        updates_left: AtomicUsize,
    }

    #[async_trait]
    impl CredentialBackend for FlakyBackend {
        async fn list(&self, page: u32, size: u32) -> Result<Page<RemoteCredential>> {
            self.inner.list(page, size).await
        }

        async fn create(&self, payload: &CredentialPayload) -> Result<RemoteCredential> {
            self.inner.create(payload).await
        }

        async fn update(&self, payload: &CredentialPayload) -> Result<RemoteCredential> {
            let left = self.updates_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(MemoirError::NetworkError("connection reset".to_string()));
            }
            self.updates_left.store(left - 1, Ordering::SeqCst);
            self.inner.update(payload).await
        }

        async fn delete(&self, uuid: &str) -> Result<()> {
            self.inner.delete(uuid).await
        }

        fn backend_name(&self) -> &'static str {
            "Flaky Backend"
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let manager = test_manager(Arc::new(InMemoryBackend::new())).await;

        let created = manager
            .create(&CredentialDraft::new("Gmail", "hunter2", Some("me@example.com"), false))
            .await
            .unwrap();
        assert_eq!(created.organization, "Gmail");

        let page = manager.list_page(0).await.unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].status, DecryptStatus::Decrypted);
        assert_eq!(page.content[0].credential.id, created.id);
        assert_eq!(page.content[0].credential.password, "hunter2");
    }

    #[tokio::test]
    async fn test_locked_manager_refuses() {
        let manager =
            CredentialManager::new(Arc::new(InMemoryBackend::new()), KeyHolder::new(), CredentialCodec::default());

        assert!(matches!(manager.list_page(0).await, Err(MemoirError::VaultLocked)));
        assert!(matches!(
            manager.create(&CredentialDraft::new("a", "b", None, false)).await,
            Err(MemoirError::VaultLocked)
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_walks_pages() {
        let manager = test_manager(Arc::new(InMemoryBackend::new()))
            .await
            .with_page_size(2);

        for i in 0..5 {
            manager
                .create(&CredentialDraft::new(&format!("org{}", i), "pw", None, false))
                .await
                .unwrap();
        }

        let all = manager.fetch_all().await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[4].credential.organization, "org4");
    }

    #[tokio::test]
    async fn test_update_and_favorite() {
        let manager = test_manager(Arc::new(InMemoryBackend::new())).await;
        let created = manager
            .create(&CredentialDraft::new("Gmail", "old", None, false))
            .await
            .unwrap();

        manager
            .update(&created.id, &CredentialDraft::new("Gmail", "new", None, false))
            .await
            .unwrap();
        let favorite = manager.set_favorite(&created.id, true).await.unwrap();
        assert!(favorite.favorite);
        assert_eq!(favorite.password, "new");

        let listed = manager.fetch_all().await.unwrap();
        assert!(listed[0].credential.favorite);
        assert_eq!(listed[0].credential.password, "new");
    }

    #[tokio::test]
    async fn test_favorite_unknown_id() {
        let manager = test_manager(Arc::new(InMemoryBackend::new())).await;
        assert!(matches!(
            manager.set_favorite("missing", true).await,
            Err(MemoirError::CredentialNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let manager = test_manager(Arc::new(InMemoryBackend::new())).await;
        let created = manager
            .create(&CredentialDraft::new("Gmail", "pw", None, false))
            .await
            .unwrap();

        manager.delete(&created.id).await.unwrap();
        assert!(manager.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_renders_undecryptable_records() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = test_manager(backend.clone()).await;
        manager
            .create(&CredentialDraft::new("good", "pw", None, false))
            .await
            .unwrap();

        // A record written under another key
        let foreign = CredentialCodec::default()
            .encrypt_record(&CredentialDraft::new("bad", "pw", None, false), &key(9), None)
            .unwrap();
        backend.create(&foreign).await.unwrap();

        let views = manager.fetch_all().await.unwrap();
        assert_eq!(views[0].status, DecryptStatus::Decrypted);
        assert_eq!(views[1].status, DecryptStatus::Failed);
    }

    #[tokio::test]
    async fn test_re_encrypt_all() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = test_manager(backend.clone()).await;
        for org in ["a", "b", "c"] {
            manager
                .create(&CredentialDraft::new(org, "pw", Some("e@x.io"), false))
                .await
                .unwrap();
        }

        let report = manager.re_encrypt_all(&key(1), &key(2)).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.re_encrypted, 3);

        let codec = CredentialCodec::default();
        for record in backend.records().await {
            let view = codec.decrypt_record(&record, &key(2)).unwrap();
            assert_eq!(view.credential.password, "pw");
            assert!(codec.decrypt_record(&record, &key(1)).is_err());
        }
    }

    #[tokio::test]
    async fn test_re_encrypt_resumes_after_failure() {
        let backend = Arc::new(FlakyBackend {
            inner: InMemoryBackend::new(),
            updates_left: AtomicUsize::new(2),
        });
        let manager = test_manager(backend.clone()).await;
        for org in ["a", "b", "c", "d"] {
            manager
                .create(&CredentialDraft::new(org, "pw", None, false))
                .await
                .unwrap();
        }

        let first = manager.re_encrypt_all(&key(1), &key(2)).await.unwrap();
        assert_eq!(first.re_encrypted, 2);
        assert_eq!(first.failed.len(), 2);

        // Each record still opens with one of the two keys
        let codec = CredentialCodec::default();
        for record in backend.inner.records().await {
            let old = codec.decrypt_record(&record, &key(1));
            let new = codec.decrypt_record(&record, &key(2));
            assert!(old.is_ok() || new.is_ok());
        }

        backend.updates_left.store(usize::MAX, Ordering::SeqCst);
        let second = manager.re_encrypt_all(&key(1), &key(2)).await.unwrap();
        assert!(second.is_complete());
        assert_eq!(second.already_migrated, 2);
        assert_eq!(second.re_encrypted, 2);
    }

    #[tokio::test]
    async fn test_re_encrypt_leaves_legacy_records() {
        let legacy = RemoteCredential {
            uuid: "legacy".to_string(),
            company: Some("Acme".to_string()),
            email: None,
            senha: Some("plain".to_string()),
            favoritos: false,
            iv1: None,
            iv2: None,
            iv3: None,
            encrypted_data: None,
            created_at: None,
            updated_at: None,
        };
        let backend = Arc::new(InMemoryBackend::with_records(vec![legacy.clone()]));
        let manager = test_manager(backend.clone()).await;

        let report = manager.re_encrypt_all(&key(1), &key(2)).await.unwrap();
        assert_eq!(report.legacy_skipped, 1);
        assert_eq!(backend.records().await[0], legacy);
    }

    #[tokio::test]
    async fn test_re_encrypt_partly_encrypted_record() {
        // Company and password under the old key, email stored in the clear
        let company = crate::crypto::encrypt_field("Gmail", &key(1)).unwrap();
        let senha = crate::crypto::encrypt_field("hunter2", &key(1)).unwrap();
        let mixed = RemoteCredential {
            uuid: "mixed".to_string(),
            company: Some(company.ciphertext),
            email: Some("me@example.com".to_string()),
            senha: Some(senha.ciphertext),
            favoritos: false,
            iv1: Some(company.iv),
            iv2: Some(senha.iv),
            iv3: None,
            encrypted_data: None,
            created_at: None,
            updated_at: None,
        };
        let backend = Arc::new(InMemoryBackend::with_records(vec![mixed]));
        let manager = test_manager(backend.clone()).await;

        let report = manager.re_encrypt_all(&key(1), &key(2)).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.re_encrypted, 1);
        assert_eq!(report.legacy_skipped, 0);

        let after = &backend.records().await[0];
        assert!(after.iv3.is_none());
        assert_eq!(after.email.as_deref(), Some("me@example.com"));

        let view = CredentialCodec::default().decrypt_record(after, &key(2)).unwrap();
        assert_eq!(view.credential.organization, "Gmail");
        assert_eq!(view.credential.password, "hunter2");

        // A second run finds it already migrated
        let again = manager.re_encrypt_all(&key(1), &key(2)).await.unwrap();
        assert_eq!(again.already_migrated, 1);
        assert!(again.is_complete());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_fields() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = test_manager(backend.clone()).await;

        assert!(matches!(
            manager.create(&CredentialDraft::new("Gmail", "", None, false)).await,
            Err(MemoirError::InvalidCredential(_))
        ));

        let created = manager
            .create(&CredentialDraft::new("Gmail", "pw", None, false))
            .await
            .unwrap();
        assert!(matches!(
            manager.update(&created.id, &CredentialDraft::new("", "pw", None, false)).await,
            Err(MemoirError::InvalidCredential(_))
        ));
        assert_eq!(backend.records().await.len(), 1);
    }
}
