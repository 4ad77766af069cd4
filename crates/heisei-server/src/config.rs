//! Server configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! environment overrides.

use crate::limiter::LimiterConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// An environment override could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv {
        /// Environment variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// A setting is out of range
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Setting name
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Deadline applied to transactional writes, in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_ms: 5000,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener
    pub server: ListenConfig,
    /// Admission control
    pub limiter: LimiterConfig,
    /// Logging
    pub log: LogConfig,
}

impl ServerConfig {
    /// Resolve configuration from defaults, `path`, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        override_parsed(&lookup, "SERVER_PORT", &mut self.server.port)?;
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log.level = level;
        }
        override_parsed(&lookup, "RATE_LIMIT_BURST", &mut self.limiter.capacity)?;
        override_parsed(
            &lookup,
            "RATE_LIMIT_PER_SECOND",
            &mut self.limiter.refill_per_second,
        )?;
        Ok(())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limiter.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "limiter.capacity",
                reason: "must be at least 1",
            });
        }
        if !self.limiter.refill_per_second.is_finite() || self.limiter.refill_per_second <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "limiter.refill_per_second",
                reason: "must be a positive number",
            });
        }
        if self.limiter.shards == 0 {
            return Err(ConfigError::Invalid {
                field: "limiter.shards",
                reason: "must be at least 1",
            });
        }
        if self.limiter.reclaim_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "limiter.reclaim_interval_secs",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.server.host, self.server.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            field: "server.host",
            reason: "not an IP address",
        })
    }

    /// Deadline for transactional writes
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limiter.capacity, 10);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[
                ("SERVER_PORT", "9090"),
                ("LOG_LEVEL", "debug"),
                ("RATE_LIMIT_PER_SECOND", "2.5"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.limiter.refill_per_second, 2.5);
    }

    #[test]
    fn unparseable_override_is_an_error() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(env(&[("SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "SERVER_PORT", .. }));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = ServerConfig::default();
        config.limiter.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "limiter.capacity",
                ..
            })
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str("[limiter]\ncapacity = 3\n").unwrap();
        assert_eq!(config.limiter.capacity, 3);
        assert_eq!(config.limiter.refill_per_second, 5.0);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
