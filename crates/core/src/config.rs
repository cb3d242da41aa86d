//! Application Configuration
//!
//! Manages the persisted settings of the SDK manager:
//! - SDK root location and download server
//! - Post-install tool locations (python, npm)
//! - A flat key-value settings table (e.g. the release channel)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{CoreError, Result};

/// Settings key holding the selected release channel
pub const CHANNEL_KEY: &str = "sdk-channel";

/// Default remote SDK store
pub const DEFAULT_DOWNLOAD_SERVER: &str = "https://sdk.core.store";

/// SDK manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Override for the SDK root directory
    pub sdk_dir: Option<PathBuf>,
    /// Base URL of the remote SDK store
    pub download_server: String,
    /// Python interpreter used to create SDK virtualenvs
    pub python: PathBuf,
    /// npm executable used for JS dependencies
    pub npm: PathBuf,
    /// Fetch the native toolchain after installing an SDK
    pub install_toolchain: bool,
    /// Seconds a connection may stay silent before it is abandoned
    pub timeout_secs: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            sdk_dir: None,
            download_server: DEFAULT_DOWNLOAD_SERVER.to_string(),
            python: PathBuf::from(if cfg!(windows) { "python" } else { "python3" }),
            npm: PathBuf::from("npm"),
            install_toolchain: true,
            timeout_secs: 300,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version for migrations
    pub version: u32,
    /// SDK manager settings
    pub sdk: SdkConfig,
    /// Free-form persisted settings
    settings: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            sdk: SdkConfig::default(),
            settings: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("io", "rebble", "pebble-sdk")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        ProjectDirs::from("io", "rebble", "pebble-sdk")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Load configuration from the default location
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| CoreError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from a file, writing defaults if it does not exist
    pub async fn load_from(config_file: &Path) -> Result<Self> {
        if config_file.exists() {
            debug!("Loading config from {:?}", config_file);
            let contents = tokio::fs::read_to_string(config_file).await?;
            let config: AppConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            info!("Config file not found, using defaults");
            let config = AppConfig::default();
            config.save_to(config_file).await?;
            Ok(config)
        }
    }

    /// Save configuration to the default location
    pub async fn save(&self) -> Result<()> {
        let config_file = Self::config_file()
            .ok_or_else(|| CoreError::Config("Cannot determine config path".into()))?;
        self.save_to(&config_file).await
    }

    /// Save configuration to a file
    pub async fn save_to(&self, config_file: &Path) -> Result<()> {
        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(config_file, contents).await?;

        debug!("Config saved to {:?}", config_file);
        Ok(())
    }

    /// Read a persisted setting
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Read a persisted setting with a fallback
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Store a setting (persisted on the next save)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    /// The selected release channel; empty means the default track
    pub fn channel(&self) -> &str {
        self.get_or(CHANNEL_KEY, "")
    }

    /// SDK root directory, falling back to `<data dir>/SDKs`
    pub fn sdk_dir(&self) -> PathBuf {
        self.sdk.sdk_dir.clone().unwrap_or_else(|| {
            Self::data_dir()
                .or_else(|| dirs::data_local_dir().map(|d| d.join("pebble-sdk")))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("SDKs")
        })
    }
}
