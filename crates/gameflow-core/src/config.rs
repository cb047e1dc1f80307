//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, request timeout, which storage medium holds the
//! credentials, and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/gameflow/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::store::{EncryptedFileMedium, FileMedium, KeySource, KeyValueMedium, KeyringMedium};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "gameflow";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides the configured API base URL.
pub const API_URL_ENV: &str = "GAMEFLOW_API_URL";

/// Selects passphrase-derived keys for the encrypted store.
pub const STORE_PASSPHRASE_ENV: &str = "GAMEFLOW_STORE_PASSPHRASE";

/// Where the credential store keeps its records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Encrypted,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
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

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for stored credentials and logs.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Environment beats config beats the built-in default.
    pub fn base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }

    /// Open the configured storage medium under `dir`.
    pub fn open_medium(&self, dir: PathBuf) -> Result<Box<dyn KeyValueMedium>> {
        let medium: Box<dyn KeyValueMedium> = match self.storage {
            StorageBackend::File => Box::new(
                FileMedium::new(dir.join("store")).context("Failed to open file store")?,
            ),
            StorageBackend::Keyring => Box::new(KeyringMedium::default()),
            StorageBackend::Encrypted => {
                let source = match std::env::var(STORE_PASSPHRASE_ENV) {
                    Ok(passphrase) if !passphrase.is_empty() => KeySource::Passphrase(passphrase),
                    _ => KeySource::Keychain(KeyringMedium::default()),
                };
                Box::new(
                    EncryptedFileMedium::open(dir.join("vault"), source)
                        .context("Failed to open encrypted store")?,
                )
            }
        };
        Ok(medium)
    }
}
