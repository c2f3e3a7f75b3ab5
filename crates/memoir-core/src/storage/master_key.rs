//! Device copy of the master key file, wrapped by the at-rest envelope

use std::sync::Arc;
use tracing::debug;

use super::SecureStorage;
use crate::crypto::{decrypt_file_content, encrypt_file_content, MasterSecret};
use crate::error::{MemoirError, Result};

pub const MASTER_KEY_FILE_KEY: &str = "memoir_encrypted_master_key_file";

/// Stores the master key file content so the device can unlock without it
#[derive(Clone)]
pub struct MasterKeyFileStore {
    storage: Arc<dyn SecureStorage>,
}

impl MasterKeyFileStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Whether a master key file has been stored on this device
    pub async fn exists(&self) -> Result<bool> {
        self.storage.exists(MASTER_KEY_FILE_KEY).await
    }

    /// Wrap and store the master key file content
    pub async fn save(&self, secret: &MasterSecret) -> Result<()> {
        let envelope = encrypt_file_content(secret)?;
        self.storage.store(MASTER_KEY_FILE_KEY, &envelope).await?;

        debug!("Stored master key file envelope");
        Ok(())
    }

    /// Load and unwrap the stored master key file content
    pub async fn load(&self) -> Result<MasterSecret> {
        let envelope = self
            .storage
            .retrieve(MASTER_KEY_FILE_KEY)
            .await?
            .ok_or(MemoirError::MasterKeyFileMissing)?;

        decrypt_file_content(&envelope)
    }

    pub async fn remove(&self) -> Result<()> {
        self.storage.delete(MASTER_KEY_FILE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::with_dir(dir.path()).unwrap());
        let store = MasterKeyFileStore::new(storage.clone());

        assert!(!store.exists().await.unwrap());
        assert!(matches!(store.load().await, Err(MemoirError::MasterKeyFileMissing)));

        let secret = MasterSecret::new("line one\nline two").unwrap();
        store.save(&secret).await.unwrap();

        assert!(store.exists().await.unwrap());
        assert_eq!(store.load().await.unwrap().expose(), secret.expose());

        // Never stored in the clear
        let raw = storage.retrieve(MASTER_KEY_FILE_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("line one"));
    }

    #[tokio::test]
    async fn test_corrupted_envelope() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::with_dir(dir.path()).unwrap());
        storage.store(MASTER_KEY_FILE_KEY, "not an envelope").await.unwrap();

        let store = MasterKeyFileStore::new(storage);
        assert!(matches!(store.load().await, Err(MemoirError::DecryptionError(_))));
    }
}
