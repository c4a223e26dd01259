//! Runtime configuration for the chain core.
//!
//! # Responsibility
//! - Parse JSON configuration into a typed `CoreConfig`.
//! - Supply defaults for every field so an empty object is valid.
//!
//! # Invariants
//! - `busy_timeout_ms` is always greater than zero after `validate()`.
//! - `log_dir`, when set, must be an absolute path (checked by logging init).

use crate::logging::{default_log_level, init_logging};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Source text is not valid JSON for `CoreConfig`.
    Parse(serde_json::Error),
    /// Parsed value violates a field constraint.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. Logging stays off when `None`.
    pub log_dir: Option<String>,
    /// How long a writer waits for the SQLite write lock.
    pub busy_timeout_ms: u64,
    /// Also reconcile after a direct `next_topic` field revision.
    pub reconcile_on_field_revision: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            reconcile_on_field_revision: false,
        }
    }
}

impl CoreConfig {
    /// Parses and validates configuration from JSON text.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Starts file logging when `log_dir` is configured.
    ///
    /// Returns `Ok(false)` when logging is not configured.
    pub fn init_logging(&self) -> Result<bool, String> {
        match self.log_dir.as_deref() {
            Some(log_dir) => init_logging(self.log_level.as_str(), log_dir).map(|()| true),
            None => Ok(false),
        }
    }
}
