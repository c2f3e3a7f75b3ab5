//! Remote credential store abstraction
//!
//! The backend only ever sees ciphertext and IVs. `memoir-api` implements this
//! trait over HTTP; `InMemoryBackend` keeps records in process.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::credential::{CredentialPayload, Page, RemoteCredential};
use crate::error::{MemoirError, Result};

/// Result of a successful backend login
#[derive(Clone)]
pub struct AuthGrant {
    /// Bearer token for subsequent requests
    pub token: String,
    pub username: Option<String>,
    /// Per-user salt, for deployments using server-issued salts
    pub salt: Option<String>,
}

impl std::fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGrant")
            .field("token", &"[REDACTED]")
            .field("username", &self.username)
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Trait for exchanging account credentials for a session token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<AuthGrant>;
}

/// Trait for remote credential stores
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Fetch one page of credentials (pages are zero-based)
    async fn list(&self, page: u32, size: u32) -> Result<Page<RemoteCredential>>;

    /// Create a credential and return the stored record
    async fn create(&self, payload: &CredentialPayload) -> Result<RemoteCredential>;

    /// Replace a credential; `payload.uuid` identifies it
    async fn update(&self, payload: &CredentialPayload) -> Result<RemoteCredential>;

    /// Delete a credential
    async fn delete(&self, uuid: &str) -> Result<()>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}

/// Credential store held in memory, in insertion order
#[derive(Default)]
pub struct InMemoryBackend {
    records: RwLock<Vec<RemoteCredential>>,
}

impl InMemoryBackend {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records
    pub fn with_records(records: Vec<RemoteCredential>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Snapshot every stored record
    pub async fn records(&self) -> Vec<RemoteCredential> {
        self.records.read().await.clone()
    }

    fn apply(record: &mut RemoteCredential, payload: &CredentialPayload) {
        record.company = payload.company.clone();
        record.email = payload.email.clone();
        record.senha = payload.senha.clone();
        record.favoritos = payload.favoritos;
        record.iv1 = payload.iv1.clone();
        record.iv2 = payload.iv2.clone();
        record.iv3 = payload.iv3.clone();
        record.encrypted_data = payload.encrypted_data.clone();
        record.updated_at = Some(Utc::now().to_rfc3339());
    }
}

#[async_trait]
impl CredentialBackend for InMemoryBackend {
    async fn list(&self, page: u32, size: u32) -> Result<Page<RemoteCredential>> {
        if size == 0 {
            return Err(MemoirError::InvalidSetting("Page size must be positive".to_string()));
        }

        let records = self.records.read().await;
        let total_items = records.len() as u64;
        let total_pages = records.len().div_ceil(size as usize) as u32;

        let content: Vec<RemoteCredential> = records
            .iter()
            .skip(page as usize * size as usize)
            .take(size as usize)
            .cloned()
            .collect();

        Ok(Page {
            content,
            current_page: page,
            page_size: size,
            total_items,
            total_pages,
            has_next: page + 1 < total_pages,
            has_previous: page > 0,
        })
    }

    async fn create(&self, payload: &CredentialPayload) -> Result<RemoteCredential> {
        let now = Utc::now().to_rfc3339();
        let mut record = RemoteCredential {
            uuid: Uuid::new_v4().to_string(),
            company: None,
            email: None,
            senha: None,
            favoritos: false,
            iv1: None,
            iv2: None,
            iv3: None,
            encrypted_data: None,
            created_at: Some(now),
            updated_at: None,
        };
        Self::apply(&mut record, payload);

        self.records.write().await.push(record.clone());

        debug!("Created credential {}", record.uuid);
        Ok(record)
    }

    async fn update(&self, payload: &CredentialPayload) -> Result<RemoteCredential> {
        let uuid = payload
            .uuid
            .as_deref()
            .ok_or_else(|| MemoirError::CredentialNotFound("update without uuid".to_string()))?;

        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.uuid == uuid)
            .ok_or_else(|| MemoirError::CredentialNotFound(uuid.to_string()))?;

        Self::apply(record, payload);

        debug!("Updated credential {}", uuid);
        Ok(record.clone())
    }

    async fn delete(&self, uuid: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.uuid != uuid);

        if records.len() == before {
            return Err(MemoirError::CredentialNotFound(uuid.to_string()));
        }

        debug!("Deleted credential {}", uuid);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(company: &str) -> CredentialPayload {
        CredentialPayload {
            uuid: None,
            company: Some(company.to_string()),
            email: None,
            senha: Some("x".to_string()),
            favoritos: false,
            iv1: None,
            iv2: None,
            iv3: None,
            encrypted_data: None,
        }
    }

    #[tokio::test]
    async fn test_pagination() {
        let backend = InMemoryBackend::new();
        for i in 0..5 {
            backend.create(&payload(&format!("c{}", i))).await.unwrap();
        }

        let first = backend.list(0, 2).await.unwrap();
        assert_eq!(first.content.len(), 2);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let last = backend.list(2, 2).await.unwrap();
        assert_eq!(last.content.len(), 1);
        assert!(!last.has_next);
        assert_eq!(last.content[0].company.as_deref(), Some("c4"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let backend = InMemoryBackend::new();
        let created = backend.create(&payload("before")).await.unwrap();

        let mut update = payload("after");
        update.uuid = Some(created.uuid.clone());
        let updated = backend.update(&update).await.unwrap();
        assert_eq!(updated.company.as_deref(), Some("after"));
        assert_eq!(updated.created_at, created.created_at);

        backend.delete(&created.uuid).await.unwrap();
        assert!(backend.records().await.is_empty());
        assert!(matches!(
            backend.delete(&created.uuid).await,
            Err(MemoirError::CredentialNotFound(_))
        ));
    }
}
