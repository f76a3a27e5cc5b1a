//! Application configuration module
//!
//! `AppConfig` is built through [`AppConfigBuilder`], either directly, from a
//! TOML file, or from `PRICECRAFT_*` environment variables layered on top of a
//! file. A missing API URL means the store runs in pure local mode.
//!
//! ```toml
//! api_url = "https://example.supabase.co"
//! api_key = "anon-key"
//! app_url = "https://pricemycraft.app/"
//! sync_debounce_ms = 2000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

/// Default base URL share links are built on
pub const DEFAULT_APP_URL: &str = "http://localhost:5173/";

/// Quiet period before a local edit is pushed
pub const DEFAULT_SYNC_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Remote workspace service base URL
    pub api_url: Option<Url>,
    /// Public API key sent with every request to the service
    pub api_key: Option<String>,
    /// Directory for the on-disk key-value store
    pub data_dir: Option<PathBuf>,
    /// Base URL of the web app, used for shareable links
    pub app_url: Url,
    pub sync_debounce: Duration,
}

/// On-disk shape of the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    api_key: Option<String>,
    data_dir: Option<PathBuf>,
    app_url: Option<String>,
    sync_debounce_ms: Option<u64>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Whether a remote workspace service is configured
    pub fn remote_enabled(&self) -> bool {
        self.api_url.is_some()
    }

    /// Directory for local data, falling back to the platform data dir
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
            path.push("pricecraft");
            path
        })
    }

    /// Parse a TOML document into a builder
    pub fn builder_from_toml(source: &str) -> Result<AppConfigBuilder, ConfigError> {
        let file: FileConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut builder = AppConfigBuilder::default();
        builder.api_url = file.api_url;
        builder.api_key = file.api_key;
        builder.data_dir = file.data_dir;
        builder.app_url = file.app_url;
        builder.sync_debounce_ms = file.sync_debounce_ms;
        Ok(builder)
    }

    /// Load configuration: optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
                Self::builder_from_toml(&source)?
            }
            None => AppConfigBuilder::default(),
        };
        builder.with_env_overrides(|key| std::env::var(key).ok()).build()
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_url: Option<String>,
    api_key: Option<String>,
    data_dir: Option<PathBuf>,
    app_url: Option<String>,
    sync_debounce_ms: Option<u64>,
}

impl AppConfigBuilder {
    /// Set the remote service URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the base URL share links are built on
    pub fn app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    pub fn sync_debounce_ms(mut self, millis: u64) -> Self {
        self.sync_debounce_ms = Some(millis);
        self
    }

    /// Apply `PRICECRAFT_*` overrides from `lookup` (usually the process env)
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("PRICECRAFT_API_URL") {
            self.api_url = Some(url);
        }
        if let Some(key) = lookup("PRICECRAFT_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(dir) = lookup("PRICECRAFT_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup("PRICECRAFT_APP_URL") {
            self.app_url = Some(url);
        }
        if let Some(ms) = lookup("PRICECRAFT_SYNC_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.sync_debounce_ms = Some(ms);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_url = self
            .api_url
            .filter(|url| !url.trim().is_empty())
            .map(|url| Url::parse(&url).map_err(|_| ConfigError::InvalidUrl(url)))
            .transpose()?;

        if api_url.is_some() && self.api_key.is_none() {
            return Err(ConfigError::MissingValue("api_key"));
        }

        let app_url = self.app_url.unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let app_url = Url::parse(&app_url).map_err(|_| ConfigError::InvalidUrl(app_url))?;

        Ok(AppConfig {
            api_url,
            api_key: self.api_key,
            data_dir: self.data_dir,
            app_url,
            sync_debounce: self
                .sync_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SYNC_DEBOUNCE),
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to read config: {0}")]
    Io(String),
}
