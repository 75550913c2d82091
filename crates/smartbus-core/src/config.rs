//! Application configuration management.
//!
//! Configuration is stored at `<config_dir>/smartbus/config.json`; a missing
//! file or missing fields fall back to the defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{IDLE_CHECK_INTERVAL_SECS, SESSION_TIMEOUT_MINUTES};

/// Application name used for config/data/cache directory paths
const APP_NAME: &str = "smartbus";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Longest idle timeout accepted from the config file (one week)
const MAX_SESSION_TIMEOUT_MINUTES: i64 = 7 * 24 * 60;

/// Longest pause between idle checks accepted from the config file
const MAX_IDLE_CHECK_INTERVAL_SECS: u64 = 60 * 60;

/// Where the web app is served from during development.
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin that relative manifest entries resolve against.
    pub origin: String,
    pub session_timeout_minutes: i64,
    pub idle_check_interval_secs: u64,
    /// Seal stored values with a key from the OS keyring.
    pub encrypt_storage: bool,
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            session_timeout_minutes: SESSION_TIMEOUT_MINUTES,
            idle_check_interval_secs: IDLE_CHECK_INTERVAL_SECS,
            encrypt_storage: false,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the key-value store and logs.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Directory for offline cache partitions.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.join("cache"));
        }
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_timeout_minutes.clamp(1, MAX_SESSION_TIMEOUT_MINUTES))
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs.clamp(1, MAX_IDLE_CHECK_INTERVAL_SECS))
    }
}
