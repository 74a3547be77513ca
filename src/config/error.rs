//! Error types for loading and validating tool settings.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving the tool settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file not found at an explicitly requested path
    #[error("Settings file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read settings file
    #[error("Failed to read settings file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid settings value
    #[error("Invalid settings value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// Environment variable parse error
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    /// Create a validation error
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an env parse error
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for settings operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
