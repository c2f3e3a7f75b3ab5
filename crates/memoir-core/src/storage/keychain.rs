//! OS keychain storage backend
//!
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use super::SecureStorage;
use crate::error::{MemoirError, Result};

/// Service name used for keychain entries
pub const KEYCHAIN_SERVICE: &str = "memoir";

fn keychain_error(e: keyring::Error) -> MemoirError {
    MemoirError::KeychainError(e.to_string())
}

/// Keychain-backed storage; one entry per key under a shared service name
pub struct KeychainStorage {
    service: String,
}

impl KeychainStorage {
    /// Create a store under the default service name
    pub fn new() -> Self {
        Self::with_service(KEYCHAIN_SERVICE)
    }

    /// Create a store under a custom service name
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    /// Round-trip a probe entry to see whether a keychain daemon answers
    pub fn probe(&self) -> bool {
        let entry = match Entry::new(&self.service, "__memoir_probe__") {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Keychain unavailable: {}", e);
                return false;
            }
        };

        match entry.set_password("probe") {
            Ok(()) => {
                let _ = entry.delete_password();
                debug!("Keychain storage is available");
                true
            }
            Err(e) => {
                warn!("Keychain unavailable: {}", e);
                false
            }
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).map_err(keychain_error)
    }
}

impl Default for KeychainStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStorage for KeychainStorage {
    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?.set_password(value).map_err(keychain_error)?;

        debug!("Stored key in keychain: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keychain_error(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keychain_error(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_does_not_panic() {
        // CI machines usually have no keychain daemon; either answer is fine
        let _ = KeychainStorage::with_service("memoir-test").probe();
    }
}
