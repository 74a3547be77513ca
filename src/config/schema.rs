//! Settings schema definitions.
//!
//! These are the settings of the provisioning tool itself, not of the MySQL
//! server it provisions (see [`crate::mycnf`] for that). Every section has
//! defaults so an empty or missing file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};

/// Default server character set written into new option files.
pub const DEFAULT_CHARACTER_SET: &str = "utf8mb4";
/// Default server collation written into new option files.
pub const DEFAULT_COLLATION: &str = "utf8mb4_unicode_ci";
/// Default `max_connections` written into new option files.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10_000;

/// Root settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database engine binaries
    pub engine: EngineConfig,
    /// Wrapper and optimize timings
    pub timings: TimingsConfig,
    /// Defaults for newly written option files
    pub defaults: DefaultsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that would make the wrapper misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timings.poll_attempts == 0 {
            return Err(ConfigError::validation(
                "timings.poll_attempts",
                "must be at least 1",
            ));
        }
        if self.timings.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "timings.poll_interval_ms",
                "must be greater than 0",
            ));
        }
        for (key, value) in [
            ("engine.mysqld", &self.engine.mysqld),
            ("engine.mysql", &self.engine.mysql),
            ("engine.mysqlcheck", &self.engine.mysqlcheck),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::validation(key, "binary name must not be empty"));
            }
        }
        Ok(())
    }
}

/// Names (or paths) of the engine's own command-line tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Server binary, also used for data directory initialization
    pub mysqld: String,
    /// Interactive client
    pub mysql: String,
    /// Table maintenance client
    pub mysqlcheck: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mysqld: "mysqld".to_string(),
            mysql: "mysql".to_string(),
            mysqlcheck: "mysqlcheck".to_string(),
        }
    }
}

/// Fixed waits used around transient server processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    /// Spacing between socket reachability checks
    pub poll_interval_ms: u64,
    /// Reachability checks before proceeding anyway
    pub poll_attempts: u32,
    /// Wait after starting the server for the optimize pass
    pub settle_ms: u64,
    /// How long a stopping server may take before it is killed
    pub drain_ms: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            poll_attempts: 20,
            settle_ms: 2000,
            drain_ms: 3000,
        }
    }
}

impl TimingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }
}

/// Values applied when an option file is first written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub character_set: String,
    pub collation: String,
    pub max_connections: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            character_set: DEFAULT_CHARACTER_SET.to_string(),
            collation: DEFAULT_COLLATION.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}
