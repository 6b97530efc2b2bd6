//! Persisted client settings.
//!
//! The API URL is user-editable so the app can point at a self-hosted
//! server. Settings live in a TOML file; re-reading them means loading the
//! file again and building a fresh `AliasClient`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::client::AliasClient;
use crate::types::ApiKey;

pub const DEFAULT_API_URL: &str = "https://app.simplelogin.io";

pub const API_URL_ENV: &str = "ALIAS_API_URL";
pub const API_KEY_ENV: &str = "ALIAS_API_KEY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid API URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no API key configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Override fields from `ALIAS_API_URL` / `ALIAS_API_KEY` when set.
    pub fn apply_env(mut self) -> Result<Self, SettingsError> {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.api_url = url;
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        url::Url::parse(&self.api_url).map_err(|source| SettingsError::InvalidUrl {
            url: self.api_url.clone(),
            source,
        })?;
        Ok(())
    }

    /// Build a client for the configured server and key.
    pub fn client(&self) -> Result<AliasClient, SettingsError> {
        let key = self.api_key.as_deref().ok_or(SettingsError::MissingApiKey)?;
        Ok(AliasClient::new(&self.api_url, ApiKey::new(key)))
    }
}
