// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! username = "svc-orders"
//! request_timeout_ms = 3000
//!
//! [[stations]]
//! name = "orders"
//! auto_register = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Schema client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Identity recorded as the creator of every uploaded schema.
    pub username: String,

    /// Upper bound on each request/reply wait (milliseconds).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Suffix for auto-registered schema names (`<station>-<suffix>`).
    #[serde(default = "default_auto_schema_suffix")]
    pub auto_schema_suffix: String,

    /// Stations known up front.
    #[serde(default)]
    pub stations: Vec<StationConfig>,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_auto_schema_suffix() -> String {
    "auto".to_string()
}

impl ClientConfig {
    /// Create a configuration for the given username with defaults.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            request_timeout_ms: default_request_timeout_ms(),
            auto_schema_suffix: default_auto_schema_suffix(),
            stations: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::Invalid("username must not be empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.auto_schema_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "auto_schema_suffix must not be empty".into(),
            ));
        }
        for (i, station) in self.stations.iter().enumerate() {
            if station.name.is_empty() {
                return Err(ConfigError::Invalid(format!("Station {} has empty name", i)));
            }
            if self.stations[..i].iter().any(|s| s.name == station.name) {
                return Err(ConfigError::Invalid(format!(
                    "Station '{}' is listed twice",
                    station.name
                )));
            }
        }
        Ok(())
    }

    /// Set the request timeout. Sub-millisecond remainders round up, so
    /// any non-zero duration stays non-zero.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        let mut millis = timeout.as_millis();
        if timeout.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        self.request_timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// Declare a station.
    pub fn station(mut self, name: impl Into<String>, auto_register: bool) -> Self {
        self.stations.push(StationConfig {
            name: name.into(),
            auto_register,
        });
        self
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Per-station settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station name.
    pub name: String,

    /// Derive the schema from the first observed message.
    #[serde(default)]
    pub auto_register: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = ClientConfig::from_toml(r#"username = "svc""#).unwrap();
        assert_eq!(config.username, "svc");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.auto_schema_suffix, "auto");
        assert!(config.stations.is_empty());
    }

    #[test]
    fn test_stations_from_toml() {
        let config = ClientConfig::from_toml(
            r#"
            username = "svc"
            request_timeout_ms = 250

            [[stations]]
            name = "orders"
            auto_register = true

            [[stations]]
            name = "audit"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.stations.len(), 2);
        assert!(config.stations[0].auto_register);
        assert!(!config.stations[1].auto_register);
    }

    #[test]
    fn test_request_timeout_rounds_up() {
        let config = ClientConfig::new("svc").request_timeout(Duration::from_micros(200));
        assert_eq!(config.request_timeout_ms, 1);
        assert!(config.validate().is_ok());

        let config = ClientConfig::new("svc").request_timeout(Duration::from_micros(1500));
        assert_eq!(config.timeout(), Duration::from_millis(2));

        let config = ClientConfig::new("svc").request_timeout(Duration::from_millis(40));
        assert_eq!(config.request_timeout_ms, 40);

        let config = ClientConfig::new("svc").request_timeout(Duration::MAX);
        assert_eq!(config.request_timeout_ms, u64::MAX);
    }

    #[test]
    fn test_validation() {
        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("svc")
            .request_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ClientConfig::new("svc")
            .station("orders", true)
            .station("orders", false)
            .validate()
            .is_err());
        assert!(ClientConfig::new("svc").station("orders", true).validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "username = \"svc\"\nauto_schema_suffix = \"derived\"\n").unwrap();
        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.auto_schema_suffix, "derived");

        let missing = ClientConfig::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig::new("svc").station("orders", true);
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        assert!(toml_str.contains("username = \"svc\""));
        assert!(toml_str.contains("auto_register = true"));
    }
}
