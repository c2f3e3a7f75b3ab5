//! JSON file storage backend
//!
//! Keeps every entry in one JSON document in the data directory. Values are
//! written as given: callers that need confidentiality store ciphertext.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::SecureStorage;
use crate::error::{MemoirError, Result};

const STORAGE_FILE_NAME: &str = "storage.json";
const STORAGE_FORMAT_VERSION: u32 = 1;

/// File format for persistent storage
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// File-backed key-value storage
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) the store inside `dir`
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(STORAGE_FILE_NAME);
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let file: StorageFile = serde_json::from_str(&contents)?;
            if file.version > STORAGE_FORMAT_VERSION {
                return Err(MemoirError::StorageError(format!(
                    "Storage file version {} is newer than supported version {}",
                    file.version, STORAGE_FORMAT_VERSION
                )));
            }
            file.entries
        } else {
            BTreeMap::new()
        };

        debug!("File storage opened at {:?} ({} entries)", path, entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole map atomically through a temp file, handing it back on success
    async fn persist(&self, entries: BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        let file = StorageFile {
            version: STORAGE_FORMAT_VERSION,
            entries,
        };
        let contents = serde_json::to_string_pretty(&file)?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(file.entries)
    }
}

#[async_trait]
impl SecureStorage for FileStorage {
    async fn store(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        *entries = self.persist(next).await?;

        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            let mut next = entries.clone();
            next.remove(key);
            *entries = self.persist(next).await?;
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "File Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::with_dir(dir.path()).unwrap();

        storage.store("auth_token", "abc").await.unwrap();
        assert_eq!(storage.retrieve("auth_token").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.retrieve("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::with_dir(dir.path()).unwrap();

        storage.store("k", "v").await.unwrap();
        assert!(storage.exists("k").await.unwrap());

        storage.delete("k").await.unwrap();
        assert!(!storage.exists("k").await.unwrap());

        // Deleting again is fine
        storage.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = TempDir::new().unwrap();

        {
            let storage = FileStorage::with_dir(dir.path()).unwrap();
            storage.store("auth_salt", "s4lt").await.unwrap();
        }

        let reopened = FileStorage::with_dir(dir.path()).unwrap();
        assert_eq!(reopened.retrieve("auth_salt").await.unwrap().as_deref(), Some("s4lt"));
        assert!(!reopened.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_newer_format() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(STORAGE_FILE_NAME),
            r#"{"version": 99, "entries": {}}"#,
        )
        .unwrap();

        assert!(matches!(
            FileStorage::with_dir(dir.path()),
            Err(MemoirError::StorageError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_entries_unchanged() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::with_dir(dir.path()).unwrap();
        storage.store("k", "v1").await.unwrap();

        // A non-empty directory in place of the file makes the rename fail
        std::fs::remove_file(storage.path()).unwrap();
        std::fs::create_dir(storage.path()).unwrap();
        std::fs::write(storage.path().join("blocker"), "x").unwrap();

        assert!(storage.store("k", "v2").await.is_err());
        assert_eq!(storage.retrieve("k").await.unwrap().as_deref(), Some("v1"));

        assert!(storage.delete("k").await.is_err());
        assert!(storage.exists("k").await.unwrap());
    }
}
