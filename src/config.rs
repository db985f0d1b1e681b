//! Configuration file parser for ~/.config/rainfeeds/config.toml.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted and logged as warnings.
//! The Raindrop access token is not a config key; it only
//! comes from the environment.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::raindrop::DEFAULT_API_BASE_URL;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),

    #[error("HOME environment variable not set")]
    NoConfigDir,
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level configuration. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subscription file. `None` means `<config dir>/feeds.opml`.
    pub feeds_path: Option<PathBuf>,

    /// Raindrop group whose collections receive entries.
    pub group: String,

    /// Raindrop REST base URL.
    pub api_base_url: String,

    /// Timeout for each feed fetch and API call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds_path: None,
            group: "Inbox".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 4] =
        ["feeds_path", "group", "api_base_url", "request_timeout_secs"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), group = %config.group, "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.group.trim().is_empty() {
            return Err(ConfigError::Invalid("group must not be empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Loads the config named by `--config` (or `<config dir>/config.toml`)
    /// and picks the subscription file named by `--feeds` (or the config's
    /// `feeds_path`).
    ///
    /// `config_dir` is only called when a flag is missing and the default
    /// location is needed, so both flags together work without `HOME`.
    pub fn load_with_overrides<F>(
        config_arg: Option<&Path>,
        feeds_arg: Option<&Path>,
        config_dir: F,
    ) -> Result<(Self, PathBuf), ConfigError>
    where
        F: Fn() -> Result<PathBuf, ConfigError>,
    {
        let config = match config_arg {
            Some(path) => Self::load(path)?,
            None => Self::load(&config_dir()?.join("config.toml"))?,
        };

        let feeds_path = match (feeds_arg, &config.feeds_path) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(path)) if path.is_absolute() => path.clone(),
            (None, _) => config.resolve_feeds_path(&config_dir()?),
        };

        Ok((config, feeds_path))
    }

    /// Subscription file location, relative paths resolved against
    /// `config_dir`.
    pub fn resolve_feeds_path(&self, config_dir: &Path) -> PathBuf {
        match &self.feeds_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => config_dir.join(p),
            None => config_dir.join("feeds.opml"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
