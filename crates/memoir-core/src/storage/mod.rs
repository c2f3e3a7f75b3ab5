//! Local persistence for session and device state
//!
//! Two backends implement `SecureStorage`:
//! 1. OS keychain
//! 2. JSON file in the data directory (fallback)
//!
//! `TokenStore` and `MasterKeyFileStore` sit on top of either one.

mod file;
mod keychain;
mod master_key;
mod tokens;
mod traits;

pub use file::FileStorage;
pub use keychain::{KeychainStorage, KEYCHAIN_SERVICE};
pub use master_key::{MasterKeyFileStore, MASTER_KEY_FILE_KEY};
pub use tokens::{TokenStore, AUTH_SALT_KEY, AUTH_TOKEN_KEY, TOKEN_EXPIRY_KEY, TOKEN_LIFETIME_HOURS};
pub use traits::SecureStorage;

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;

/// Pick the keychain when requested and reachable, else the file store in `dir`
pub fn open_storage(dir: &Path, prefer_keychain: bool) -> Result<Arc<dyn SecureStorage>> {
    if prefer_keychain {
        let keychain = KeychainStorage::new();
        if keychain.probe() {
            info!("Using {} for local state", keychain.backend_name());
            return Ok(Arc::new(keychain));
        }
    }

    let file = FileStorage::with_dir(dir)?;
    info!("Using file storage at {:?}", file.path());
    Ok(Arc::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_storage_file_fallback() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(dir.path(), false).unwrap();

        assert_eq!(storage.backend_name(), "File Storage");
        storage.store("k", "v").await.unwrap();
        assert!(dir.path().join("storage.json").exists());
    }
}
