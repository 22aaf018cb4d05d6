//! Configuration for save coordination.
//!
//! This module provides the recognized auto-save options together with
//! serialization support, so hosts can persist them alongside their other
//! user preferences.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Default quiet period after the last edit before a save fires, in
/// milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Default interval between retry attempts after a failed save, in
/// milliseconds.
pub const DEFAULT_RETRY_MS: u64 = 5000;

/// Recognized auto-save options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    /// Version of the configuration format.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Quiet period after the last edit before a save fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Fixed interval between retry attempts after a failed save.
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Whether automatic saving is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_retry_ms() -> u64 {
    DEFAULT_RETRY_MS
}

fn default_enabled() -> bool {
    true
}

impl AutoSaveConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            retry_ms: DEFAULT_RETRY_MS,
            enabled: true,
        }
    }

    /// Set the debounce delay in milliseconds.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the retry interval in milliseconds.
    pub fn with_retry_ms(mut self, ms: u64) -> Self {
        self.retry_ms = ms;
        self
    }

    /// Set whether automatic saving starts out enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The debounce delay as a [`Duration`].
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The retry interval as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutoSaveConfig::default();
        assert_eq!(config.debounce_ms, 1500);
        assert_eq!(config.retry_ms, 5000);
        assert!(config.enabled);
        assert_eq!(config.debounce_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_builders() {
        let config = AutoSaveConfig::new()
            .with_debounce_ms(200)
            .with_retry_ms(1000)
            .with_enabled(false);
        assert_eq!(config.debounce_ms, 200);
        assert_eq!(config.retry_ms, 1000);
        assert!(!config.enabled);
    }

    #[test]
    fn test_json_round_trip() {
        let config = AutoSaveConfig::new().with_debounce_ms(300);
        let json = config.to_json().unwrap();
        let loaded = AutoSaveConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = AutoSaveConfig::from_json("{}").unwrap();
        assert_eq!(loaded, AutoSaveConfig::default());
    }

    #[test]
    fn test_version_too_new_rejected() {
        let json = format!("{{\"version\": {}}}", CONFIG_VERSION + 1);
        match AutoSaveConfig::from_json(&json) {
            Err(ConfigError::VersionTooNew { file_version, .. }) => {
                assert_eq!(file_version, CONFIG_VERSION + 1);
            }
            other => panic!("expected VersionTooNew, got {:?}", other),
        }
    }
}
