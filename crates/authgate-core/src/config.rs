//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API server URL, the session storage backend, and the
//! last used username.
//!
//! Configuration is stored at `~/.config/authgate/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{FileStorage, KeyringStorage, SessionStore, DEFAULT_MAX_AGE_HOURS};

/// Application name used for config/cache directory paths and keychain service
const APP_NAME: &str = "authgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Environment variable overriding `server_url`
pub const SERVER_URL_ENV: &str = "AUTHGATE_SERVER_URL";

/// Where the session record is persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub storage: StorageBackend,
    pub last_username: Option<String>,
    pub session_max_age_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            storage: StorageBackend::default(),
            last_username: None,
            session_max_age_hours: DEFAULT_MAX_AGE_HOURS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|u| !u.is_empty()) {
            debug!(server_url = %url, "Server URL overridden from environment");
            self.server_url = url;
        }
        self
    }

    /// Session lifetime used at rehydration. Non-positive or overflowing
    /// values fall back to the server's token lifetime.
    pub fn max_age(&self) -> Duration {
        match Duration::try_hours(self.session_max_age_hours) {
            Some(age) if self.session_max_age_hours > 0 => age,
            _ => {
                warn!(
                    session_max_age_hours = self.session_max_age_hours,
                    default = DEFAULT_MAX_AGE_HOURS,
                    "Invalid session_max_age_hours, using default"
                );
                Duration::hours(DEFAULT_MAX_AGE_HOURS)
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the session store on the configured backend, rehydrating any
    /// persisted session.
    pub fn open_store(&self) -> SessionStore {
        match self.storage {
            StorageBackend::File => {
                let dir = self.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
                debug!(dir = %dir.display(), "Using file session storage");
                SessionStore::open(FileStorage::new(dir), self.max_age())
            }
            StorageBackend::Keyring => {
                debug!("Using keychain session storage");
                SessionStore::open(KeyringStorage::new(APP_NAME), self.max_age())
            }
        }
    }
}
