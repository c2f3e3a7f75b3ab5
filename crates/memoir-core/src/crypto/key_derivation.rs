//! Key derivation using PBKDF2-HMAC-SHA256
//!
//! Two salt sources are supported, and a deployment uses exactly one of them:
//! - server-issued: the salt string returned by the backend at login, used with
//!   the account password
//! - self-derived: `SHA-256(trim(content))` of a master-key file, so the same
//!   file reproduces the same key without any server coordination

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{DerivedKey, MasterSecret, KEY_LENGTH};
use crate::error::{MemoirError, Result};

/// Default and minimum PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Where the PBKDF2 salt comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SaltPolicy {
    /// Random per-user salt issued by the backend, paired with a password
    ServerIssued,
    /// Salt computed from the master-key file itself
    #[default]
    SelfDerived,
}

/// PBKDF2 salt bytes
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Salt as issued by the backend (its UTF-8 bytes)
    pub fn server_issued(salt: &str) -> Result<Self> {
        if salt.is_empty() {
            return Err(MemoirError::KeyDerivationError(
                "Server salt is empty".to_string(),
            ));
        }
        Ok(Self(salt.as_bytes().to_vec()))
    }

    /// Salt derived from the secret itself: `SHA-256(trim(secret))`
    pub fn self_derived(secret: &MasterSecret) -> Self {
        let digest = Sha256::digest(secret.trimmed().as_bytes());
        Self(digest.to_vec())
    }

    /// Get the salt bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Salt({})", hex::encode(&self.0))
    }
}

/// Parameters for PBKDF2 key derivation
#[derive(Debug, Clone, Copy)]
pub struct KeyDerivationParams {
    /// Iteration count (at least `PBKDF2_ITERATIONS`)
    pub iterations: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// Derive a 256-bit key from a secret and salt using PBKDF2-HMAC-SHA256
///
/// # Arguments
/// * `secret` - Raw secret bytes (must not be empty or whitespace-only)
/// * `salt` - Salt for this deployment's policy
/// * `params` - Optional parameters; iteration counts below the floor are rejected
///
/// # Returns
/// A 32-byte key suitable for AES-256. The output is deterministic in
/// (secret, salt, iterations).
pub fn derive_key(
    secret: &[u8],
    salt: &Salt,
    params: Option<KeyDerivationParams>,
) -> Result<DerivedKey> {
    let params = params.unwrap_or_default();

    if secret.iter().all(u8::is_ascii_whitespace) {
        return Err(MemoirError::InvalidSecret);
    }

    if params.iterations < PBKDF2_ITERATIONS {
        return Err(MemoirError::KeyDerivationError(format!(
            "Iteration count {} is below the minimum of {}",
            params.iterations, PBKDF2_ITERATIONS
        )));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(secret, salt.as_bytes(), params.iterations, &mut key_bytes);

    Ok(DerivedKey::new(key_bytes))
}

/// Derive the vault key from a master secret according to the salt policy
///
/// `server_salt` is required for `SaltPolicy::ServerIssued` and ignored otherwise.
pub fn derive_master_key(
    secret: &MasterSecret,
    policy: SaltPolicy,
    server_salt: Option<&str>,
) -> Result<DerivedKey> {
    match policy {
        SaltPolicy::SelfDerived => {
            let salt = Salt::self_derived(secret);
            derive_key(secret.trimmed().as_bytes(), &salt, None)
        }
        SaltPolicy::ServerIssued => {
            let salt = server_salt.ok_or(MemoirError::NotAuthenticated)?;
            let salt = Salt::server_issued(salt)?;
            derive_key(secret.expose().as_bytes(), &salt, None)
        }
    }
}

/// Derive the vault key on the blocking thread pool
///
/// PBKDF2 at the default iteration count takes tens to hundreds of
/// milliseconds; running it inline would stall the async executor.
pub async fn derive_master_key_async(
    secret: MasterSecret,
    policy: SaltPolicy,
    server_salt: Option<String>,
) -> Result<DerivedKey> {
    debug!("Deriving master key ({:?} salt)", policy);

    tokio::task::spawn_blocking(move || {
        derive_master_key(&secret, policy, server_salt.as_deref())
    })
    .await
    .map_err(|e| MemoirError::KeyDerivationError(format!("Derivation task failed: {}", e)))?
}
