//! Settings for the provisioning tool.
//!
//! This module provides TOML-based settings with environment variable overrides.
//! They control which engine binaries are run, the fixed waits around
//! transient server processes, the defaults written into new option files and
//! logging.
//!
//! # Resolution
//!
//! Settings are loaded from the following locations (in order of priority):
//!
//! 1. `MYSQL_SANDBOX_CONFIG` environment variable (explicit path)
//! 2. `./mysql-sandbox.toml` (current directory)
//! 3. `<platform config dir>/mysql-sandbox/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `MYSQL_SANDBOX_<SECTION>_<KEY>`
//!
//! Examples:
//! - `MYSQL_SANDBOX_ENGINE_MYSQLD=/opt/mysql/bin/mysqld`
//! - `MYSQL_SANDBOX_TIMINGS_POLL_ATTEMPTS=40`
//! - `MYSQL_SANDBOX_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,ignore
//! use mysql_sandbox::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Poll attempts: {}", loader.config().timings.poll_attempts);
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, DefaultsConfig, EngineConfig, LogFormat, LoggingConfig, TimingsConfig,
    DEFAULT_CHARACTER_SET, DEFAULT_COLLATION, DEFAULT_MAX_CONNECTIONS,
};
