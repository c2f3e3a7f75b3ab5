//! Backend session token persistence

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tracing::debug;

use super::SecureStorage;
use crate::error::Result;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const AUTH_SALT_KEY: &str = "auth_salt";
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";

/// Tokens are valid for a day after issue
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Stores the bearer token, its expiry (epoch millis) and the server salt
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SecureStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Expiry for a token issued now
    pub fn default_expiry() -> DateTime<Utc> {
        Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)
    }

    /// Save a token; the salt is only overwritten when one is given
    pub async fn save_token(
        &self,
        token: &str,
        salt: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.storage.store(AUTH_TOKEN_KEY, token).await?;
        self.storage
            .store(TOKEN_EXPIRY_KEY, &expires_at.timestamp_millis().to_string())
            .await?;

        if let Some(salt) = salt {
            self.storage.store(AUTH_SALT_KEY, salt).await?;
        }

        debug!("Saved auth token (expires {})", expires_at);
        Ok(())
    }

    pub async fn get_token(&self) -> Result<Option<String>> {
        self.storage.retrieve(AUTH_TOKEN_KEY).await
    }

    pub async fn get_salt(&self) -> Result<Option<String>> {
        self.storage.retrieve(AUTH_SALT_KEY).await
    }

    /// Stored expiry; `None` when missing or unparseable
    pub async fn get_token_expiry(&self) -> Result<Option<DateTime<Utc>>> {
        let raw = self.storage.retrieve(TOKEN_EXPIRY_KEY).await?;

        Ok(raw
            .and_then(|s| s.trim().parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()))
    }

    /// Remove token, salt and expiry
    pub async fn remove_token(&self) -> Result<()> {
        self.storage.delete(AUTH_TOKEN_KEY).await?;
        self.storage.delete(AUTH_SALT_KEY).await?;
        self.storage.delete(TOKEN_EXPIRY_KEY).await?;

        debug!("Removed auth token");
        Ok(())
    }

    /// Whether the token is expired now (a missing expiry counts as expired)
    pub async fn is_token_expired(&self) -> Result<bool> {
        self.is_token_expired_at(Utc::now()).await
    }

    pub async fn is_token_expired_at(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(match self.get_token_expiry().await? {
            Some(expiry) => now >= expiry,
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStorage;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> TokenStore {
        TokenStore::new(Arc::new(FileStorage::with_dir(dir.path()).unwrap()))
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let dir = TempDir::new().unwrap();
        let tokens = test_store(&dir);
        let expiry = Utc.timestamp_millis_opt(1_900_000_000_123).unwrap();

        tokens.save_token("jwt", Some("salt"), expiry).await.unwrap();

        assert_eq!(tokens.get_token().await.unwrap().as_deref(), Some("jwt"));
        assert_eq!(tokens.get_salt().await.unwrap().as_deref(), Some("salt"));
        assert_eq!(tokens.get_token_expiry().await.unwrap(), Some(expiry));
    }

    #[tokio::test]
    async fn test_refresh_without_salt_keeps_salt() {
        let dir = TempDir::new().unwrap();
        let tokens = test_store(&dir);

        tokens
            .save_token("first", Some("salt"), TokenStore::default_expiry())
            .await
            .unwrap();
        tokens
            .save_token("second", None, TokenStore::default_expiry())
            .await
            .unwrap();

        assert_eq!(tokens.get_token().await.unwrap().as_deref(), Some("second"));
        assert_eq!(tokens.get_salt().await.unwrap().as_deref(), Some("salt"));
    }

    #[tokio::test]
    async fn test_expiry() {
        let dir = TempDir::new().unwrap();
        let tokens = test_store(&dir);

        // Nothing stored
        assert!(tokens.is_token_expired().await.unwrap());

        let expiry = Utc::now() + Duration::hours(1);
        tokens.save_token("jwt", None, expiry).await.unwrap();
        assert!(!tokens.is_token_expired().await.unwrap());
        assert!(tokens
            .is_token_expired_at(expiry + Duration::seconds(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unparseable_expiry_counts_as_expired() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::with_dir(dir.path()).unwrap());
        storage.store(TOKEN_EXPIRY_KEY, "tomorrow").await.unwrap();

        let tokens = TokenStore::new(storage);
        assert_eq!(tokens.get_token_expiry().await.unwrap(), None);
        assert!(tokens.is_token_expired().await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_token() {
        let dir = TempDir::new().unwrap();
        let tokens = test_store(&dir);
        tokens
            .save_token("jwt", Some("salt"), TokenStore::default_expiry())
            .await
            .unwrap();

        tokens.remove_token().await.unwrap();

        assert_eq!(tokens.get_token().await.unwrap(), None);
        assert_eq!(tokens.get_salt().await.unwrap(), None);
        assert!(tokens.is_token_expired().await.unwrap());
    }
}
