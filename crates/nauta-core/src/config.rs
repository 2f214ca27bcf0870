//! Application configuration management.
//!
//! This module handles loading the application configuration,
//! which includes the portal endpoints, retry/monitor tuning and the
//! data directory that holds the card store and session artifacts.
//!
//! Configuration is stored at `~/.config/nauta/config.json`. Every field
//! has a default, so a missing file is not an error.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "nauta";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "NAUTA_CONFIG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Where cards, the logout URL and the connection log live
    pub data_dir: Option<PathBuf>,
    pub portal: PortalConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Plain-HTTP page that the captive portal intercepts
    pub landing_url: String,
    /// Host name whose presence in the landing page means "not logged in"
    pub secure_host: String,
    /// Base of the login, logout and query servlets
    pub secure_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            landing_url: "http://www.etecsa.cu".to_string(),
            secure_host: "secure.etecsa.net".to_string(),
            secure_base_url: "https://secure.etecsa.net:8443/".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Logout attempts before giving up on connection errors
    pub logout_attempts: u32,
    pub monitor_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            logout_attempts: 10,
            monitor_interval_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which a cached `time_left` is fetched again
    pub time_left_refresh_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            time_left_refresh_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn time_left_refresh(&self) -> Duration {
        Duration::from_secs(self.time_left_refresh_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Resolve the data directory: `$NAUTA_CONFIG_DIR`, then the configured
    /// path, then `~/.local/share/nauta`.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Resolve and create the data directory
    pub fn ensure_data_dir(&self) -> Result<PathBuf> {
        let dir = self.data_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(dir)
    }
}
