//! Unified application error type.
//!
//! Each layer keeps its own error enum; `AppError` is what the binary sees,
//! and it decides the process exit code.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::provision::ProvisionError;
use crate::wrapper::WrapperError;

/// Exit code for runtime failures. Usage errors exit with clap's code 2.
pub const FAILURE_EXIT_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("settings: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot use base directory '{}': {source}", .path.display())]
    BaseDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Wrapper(#[from] WrapperError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to render status: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            // A failing client session's own status is the most useful code.
            Self::Provision(ProvisionError::ClientFailed { code, .. }) if *code > 0 => *code,
            _ => FAILURE_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_failure_keeps_its_code() {
        let err = AppError::from(ProvisionError::ClientFailed {
            step: "connect".into(),
            code: 7,
        });
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn other_failures_exit_one() {
        let err = AppError::from(WrapperError::NotProvisioned("/tmp/x/conf/mysql.cnf".into()));
        assert_eq!(err.exit_code(), FAILURE_EXIT_CODE);
        assert!(err.to_string().contains("provision the instance first"));
    }
}
