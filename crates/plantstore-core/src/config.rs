//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base address, request timeout, the credential
//! backend and the last used email.
//!
//! Configuration is stored at `~/.config/plantstore/config.json`.
//! `PLANTSTORE_BASE_URL` and `PLANTSTORE_CREDENTIALS` override the file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    NoopCredentialStore,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "plantstore";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Server base address; every request path is resolved against it.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api/";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const BASE_URL_ENV: &str = "PLANTSTORE_BASE_URL";
pub const CREDENTIALS_ENV: &str = "PLANTSTORE_CREDENTIALS";

/// Where the access token is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Keyring,
    File,
    Memory,
    #[serde(rename = "none")]
    Disabled,
}

impl CredentialBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Some(Self::Keyring),
            "file" => Some(Self::File),
            "memory" => Some(Self::Memory),
            "none" | "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(value) = std::env::var(CREDENTIALS_ENV) {
            match CredentialBackend::from_str(&value) {
                Some(backend) => self.credential_backend = backend,
                None => warn!(value = %value, "Unknown credential backend, keeping configured one"),
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

    /// Parsed base address, always ending in `/` so relative joins keep its path
    pub fn base_url(&self) -> Result<Url> {
        normalize_base_url(&self.base_url)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the credential store selected by `credential_backend`
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        match self.credential_backend {
            CredentialBackend::Keyring => match KeyringCredentialStore::new() {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "Keychain unavailable, token will not be persisted");
                    Arc::new(NoopCredentialStore)
                }
            },
            CredentialBackend::File => match self.cache_dir() {
                Ok(dir) => Arc::new(FileCredentialStore::new(dir)),
                Err(e) => {
                    warn!(error = %e, "No cache directory, token will not be persisted");
                    Arc::new(NoopCredentialStore)
                }
            },
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
            CredentialBackend::Disabled => Arc::new(NoopCredentialStore),
        }
    }
}

pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("Invalid base URL: {}", raw))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("Base URL cannot hold relative paths: {}", raw);
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout().as_secs(), 30);
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"credential_backend":"file"}"#).expect("parse config");
        assert_eq!(config.credential_backend, CredentialBackend::File);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.last_email, None);
    }

    #[test]
    fn test_normalize_base_url_adds_trailing_slash() {
        let url = normalize_base_url("http://localhost:3001/api").expect("valid url");
        assert_eq!(url.as_str(), "http://localhost:3001/api/");

        let url = normalize_base_url("https://shop.example.com").expect("valid url");
        assert_eq!(url.as_str(), "https://shop.example.com/");

        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("mailto:a@b.com").is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!(CredentialBackend::from_str("File"), Some(CredentialBackend::File));
        assert_eq!(CredentialBackend::from_str(" none "), Some(CredentialBackend::Disabled));
        assert_eq!(CredentialBackend::from_str("vault"), None);
    }
}
