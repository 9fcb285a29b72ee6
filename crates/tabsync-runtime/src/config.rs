//! Runtime configuration.
//!
//! Three layers, later wins: built-in defaults, an optional TOML file,
//! and `TABSYNC_*` environment variables.
//!
//! ```toml
//! # ~/.tabsync/config.toml
//! debounce_ms = 500
//! volatile_fields = ["updated", "updated_human", "revision"]
//! session_cache_key = "user"
//! store_path = "~/.tabsync/store.json"
//! ```

use crate::autosave::{AutosaveConfig, DEFAULT_VOLATILE_FIELDS};
use crate::session::DEFAULT_SESSION_CACHE_KEY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabsync_store::default_store_path;
use tabsync_types::ErrorCode;
use thiserror::Error;
use tracing::debug;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An environment override carries an unusable value.
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CONFIG_READ",
            Self::Parse { .. } => "CONFIG_PARSE",
            Self::InvalidEnv { .. } => "CONFIG_INVALID_ENV",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A read can be retried; a malformed file or variable needs the
        // operator to fix it first.
        matches!(self, Self::Read { .. })
    }
}

/// Runtime settings for the sync layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Autosave quiet period in milliseconds.
    pub debounce_ms: u64,
    /// Fields ignored by the autosave change comparison.
    pub volatile_fields: Vec<String>,
    /// Store key the session identity is cached under.
    pub session_cache_key: String,
    /// Path of the file-backed store.
    pub store_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            volatile_fields: DEFAULT_VOLATILE_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            session_cache_key: DEFAULT_SESSION_CACHE_KEY.to_string(),
            store_path: default_store_path(),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from `path` (when given and present) and the
    /// process environment, over the defaults.
    ///
    /// A missing file is not an error; the defaults apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on an unreadable or malformed file, or an
    /// unparseable environment override.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Parses configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Applies `TABSYNC_*` overrides from the given variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TABSYNC_DEBOUNCE_MS` | `debounce_ms` |
    /// | `TABSYNC_VOLATILE_FIELDS` | `volatile_fields` (comma-separated) |
    /// | `TABSYNC_SESSION_CACHE_KEY` | `session_cache_key` |
    /// | `TABSYNC_STORE_PATH` | `store_path` |
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (var, value) in vars {
            match var.as_str() {
                "TABSYNC_DEBOUNCE_MS" => {
                    self.debounce_ms =
                        value.parse().map_err(|_| ConfigError::InvalidEnv {
                            var: var.clone(),
                            value: value.clone(),
                        })?;
                }
                "TABSYNC_VOLATILE_FIELDS" => {
                    self.volatile_fields = value
                        .split(',')
                        .map(str::trim)
                        .filter(|field| !field.is_empty())
                        .map(ToString::to_string)
                        .collect();
                }
                "TABSYNC_SESSION_CACHE_KEY" => {
                    self.session_cache_key = value;
                }
                "TABSYNC_STORE_PATH" => {
                    self.store_path = PathBuf::from(value);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns the debounce window as a duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Derives an autosave configuration from these settings.
    #[must_use]
    pub fn autosave(&self) -> AutosaveConfig {
        AutosaveConfig::default()
            .debounce(self.debounce())
            .volatile_fields(self.volatile_fields.iter().cloned())
    }
}
