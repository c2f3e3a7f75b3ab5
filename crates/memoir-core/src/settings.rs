//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file.
//! Settings are readable while the vault is locked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::credential::{RecordStrategy, DEFAULT_PAGE_SIZE};
use crate::crypto::{CipherSuite, SaltPolicy};
use crate::error::{MemoirError, Result};

/// Auto-lock choices offered to the user, in minutes (0 = never)
pub const AUTO_LOCK_TIMEOUT_OPTIONS: [u32; 7] = [0, 1, 2, 5, 10, 15, 30];

pub const DEFAULT_AUTO_LOCK_TIMEOUT_MINUTES: u32 = 2;
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const SETTINGS_VERSION: u32 = 1;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Auto-lock timeout in minutes (0 = never)
    pub auto_lock_timeout_minutes: u32,
    /// Reveal passwords in listings without an extra step
    pub show_passwords_by_default: bool,
    /// Backend base URL, including any path prefix
    pub api_base_url: String,
    /// Where the key derivation salt comes from
    pub salt_policy: SaltPolicy,
    /// Field cipher for credential records
    pub cipher_suite: CipherSuite,
    /// Record layout on the wire
    pub record_strategy: RecordStrategy,
    /// Records per page when listing and exporting
    pub page_size: u32,
    /// HTTP request timeout
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            auto_lock_timeout_minutes: DEFAULT_AUTO_LOCK_TIMEOUT_MINUTES,
            show_passwords_by_default: false,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            salt_policy: SaltPolicy::default(),
            cipher_suite: CipherSuite::default(),
            record_strategy: RecordStrategy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Check values a user can set by hand
    pub fn validate(&self) -> Result<()> {
        validate_auto_lock(self.auto_lock_timeout_minutes)?;

        if self.page_size == 0 {
            return Err(MemoirError::InvalidSetting("pageSize must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(MemoirError::InvalidSetting(
                "requestTimeoutSecs must be positive".to_string(),
            ));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(MemoirError::InvalidSetting("apiBaseUrl is empty".to_string()));
        }
        Ok(())
    }
}

fn validate_auto_lock(minutes: u32) -> Result<()> {
    if AUTO_LOCK_TIMEOUT_OPTIONS.contains(&minutes) {
        Ok(())
    } else {
        Err(MemoirError::InvalidSetting(format!(
            "autoLockTimeoutMinutes must be one of {:?}, got {}",
            AUTO_LOCK_TIMEOUT_OPTIONS, minutes
        )))
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Load settings from `storage_dir`, falling back to defaults
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join("settings.json");
        let settings = match Self::load_from_file(&settings_file) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings file {:?}: {}", settings_file, e);
                Settings::default()
            }
        };

        Self {
            settings_file,
            settings,
        }
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        settings.validate()?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(&self.settings)?;

        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Validate, replace and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        self.save().await
    }

    pub fn auto_lock_timeout(&self) -> u32 {
        self.settings.auto_lock_timeout_minutes
    }

    /// Set auto-lock timeout and save
    pub async fn set_auto_lock_timeout(&mut self, minutes: u32) -> Result<()> {
        validate_auto_lock(minutes)?;
        self.settings.auto_lock_timeout_minutes = minutes;
        self.save().await
    }

    pub fn show_passwords_by_default(&self) -> bool {
        self.settings.show_passwords_by_default
    }

    pub async fn set_show_passwords_by_default(&mut self, value: bool) -> Result<()> {
        self.settings.show_passwords_by_default = value;
        self.save().await
    }

    /// Reset settings to defaults and delete the settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }
}
