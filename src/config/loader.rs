//! Settings loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "MYSQL_SANDBOX";

/// Settings file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Settings file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "mysql-sandbox.toml";

/// Environment variable for an explicit settings path
const CONFIG_PATH_ENV: &str = "MYSQL_SANDBOX_CONFIG";

/// Settings loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved settings file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded settings
    pub config: Config,
}

impl ConfigLoader {
    /// Load settings using the standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `MYSQL_SANDBOX_CONFIG` environment variable (explicit path, must exist)
    /// 2. `./mysql-sandbox.toml` (current directory)
    /// 3. `<platform config dir>/mysql-sandbox/config.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override any file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path()?;

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load settings from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default settings (no file, no env overrides).
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Get the loaded settings.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the settings.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the settings file path using standard locations.
///
/// An explicit `MYSQL_SANDBOX_CONFIG` that points nowhere is an error rather
/// than a silent fallback to defaults.
pub fn resolve_config_path() -> ConfigResult<Option<PathBuf>> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::NotFound(path));
    }

    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Ok(Some(cwd_config));
    }

    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Ok(Some(app_config));
        }
    }

    Ok(None)
}

/// Get the platform-specific settings directory for this tool.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mysql-sandbox").map(|d| d.config_dir().to_path_buf())
}

/// Get the default settings file path.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_key(section: &str, key: &str) -> String {
    format!("{}_{}_{}", ENV_PREFIX, section, key)
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str, message: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, message))
}

/// Apply environment variable overrides to the settings.
///
/// Environment variables follow the pattern: `MYSQL_SANDBOX_<SECTION>_<KEY>`
/// For example:
/// - `MYSQL_SANDBOX_ENGINE_MYSQLD=/opt/mysql/bin/mysqld`
/// - `MYSQL_SANDBOX_TIMINGS_POLL_ATTEMPTS=40`
/// - `MYSQL_SANDBOX_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Engine binaries
    if let Ok(val) = std::env::var(env_key("ENGINE", "MYSQLD")) {
        config.engine.mysqld = val;
    }
    if let Ok(val) = std::env::var(env_key("ENGINE", "MYSQL")) {
        config.engine.mysql = val;
    }
    if let Ok(val) = std::env::var(env_key("ENGINE", "MYSQLCHECK")) {
        config.engine.mysqlcheck = val;
    }

    // Timings
    let var = env_key("TIMINGS", "POLL_INTERVAL_MS");
    if let Ok(val) = std::env::var(&var) {
        config.timings.poll_interval_ms = parse_env(&var, &val, "Invalid interval")?;
    }
    let var = env_key("TIMINGS", "POLL_ATTEMPTS");
    if let Ok(val) = std::env::var(&var) {
        config.timings.poll_attempts = parse_env(&var, &val, "Invalid attempt count")?;
    }
    let var = env_key("TIMINGS", "SETTLE_MS");
    if let Ok(val) = std::env::var(&var) {
        config.timings.settle_ms = parse_env(&var, &val, "Invalid duration")?;
    }
    let var = env_key("TIMINGS", "DRAIN_MS");
    if let Ok(val) = std::env::var(&var) {
        config.timings.drain_ms = parse_env(&var, &val, "Invalid duration")?;
    }

    // Logging
    if let Ok(val) = std::env::var(env_key("LOGGING", "LEVEL")) {
        config.logging.level = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().timings.poll_attempts, 20);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("MYSQL_SANDBOX_TIMINGS_POLL_ATTEMPTS", "7");
        env::set_var("MYSQL_SANDBOX_ENGINE_MYSQLD", "/usr/sbin/mysqld");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);

        env::remove_var("MYSQL_SANDBOX_TIMINGS_POLL_ATTEMPTS");
        env::remove_var("MYSQL_SANDBOX_ENGINE_MYSQLD");

        assert!(result.is_ok());
        assert_eq!(config.timings.poll_attempts, 7);
        assert_eq!(config.engine.mysqld, "/usr/sbin/mysqld");
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_garbage() {
        env::set_var("MYSQL_SANDBOX_TIMINGS_DRAIN_MS", "soon");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);

        env::remove_var("MYSQL_SANDBOX_TIMINGS_DRAIN_MS");

        match result {
            Err(ConfigError::EnvParseError { var, .. }) => {
                assert_eq!(var, "MYSQL_SANDBOX_TIMINGS_DRAIN_MS")
            }
            other => panic!("expected EnvParseError, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[timings]\nsettle_ms = 10\n").unwrap();

        let loader = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loader.config().timings.settle_ms, 10);
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    #[serial]
    fn test_missing_explicit_path_is_error() {
        env::set_var(CONFIG_PATH_ENV, "/nonexistent/mysql-sandbox.toml");
        let result = resolve_config_path();
        env::remove_var(CONFIG_PATH_ENV);

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
