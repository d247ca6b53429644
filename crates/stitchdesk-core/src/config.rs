//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, where the local key-value storage lives, the storage
//! key names shared with the browser dashboard, and the session timing knobs.
//!
//! Configuration is stored at `~/.config/stitchdesk/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "stitchdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API endpoint of the dashboard backend
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Environment override for the API base URL
pub const ENV_API_BASE_URL: &str = "STITCHDESK_API_BASE_URL";

/// Environment override for the storage directory
pub const ENV_STORAGE_DIR: &str = "STITCHDESK_STORAGE_DIR";

/// How often the session monitor re-checks the token.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Tokens are treated as unusable this long before their literal expiry.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

/// Lead time for the softer "expiring soon" signal.
/// Currently the same horizon as the hard cutoff.
pub const DEFAULT_WARNING_BUFFER_SECS: i64 = 300;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Storage key names. These match the keys the browser dashboard writes,
/// so a storage file can be shared with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    /// Theme-only slice: `{"theme": .., "colorTheme": ..}`
    pub theme: String,
    /// Aggregate settings blob
    pub settings: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            theme: "stitchdesk-theme".to_string(),
            settings: "adminSettings".to_string(),
            access_token: "tailor_token".to_string(),
            refresh_token: "tailor_refresh_token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage_dir: Option<PathBuf>,
    pub keys: StorageKeys,
    pub poll_interval_secs: u64,
    pub expiry_buffer_secs: i64,
    pub warning_buffer_secs: i64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_dir: None,
            keys: StorageKeys::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
            warning_buffer_secs: DEFAULT_WARNING_BUFFER_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load the config file (defaults if absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Write this configuration to the standard config file location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(dir) = std::env::var(ENV_STORAGE_DIR) {
            if !dir.trim().is_empty() {
                self.storage_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// Location of the config file read by `load`.
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the local key-value storage file.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
