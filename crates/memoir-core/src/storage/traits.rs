//! Storage trait definitions

use crate::error::Result;
use async_trait::async_trait;

/// Trait for local key-value stores holding session and device state
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store a value under the given key, replacing any previous value
    async fn store(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a value by key
    async fn retrieve(&self, key: &str) -> Result<Option<String>>;

    /// Delete a value; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.retrieve(key).await?.is_some())
    }

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
