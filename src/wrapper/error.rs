//! Connect-wrapper error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;

/// Errors raised while managing a wrapper session.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// The instance has no option file, so there is nothing to start.
    #[error("no option file at {}; provision the instance first", .0.display())]
    NotProvisioned(PathBuf),

    /// The start lock could not be taken.
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the wrapper script.
    #[error("failed to write wrapper script '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to run a wrapper script as a child process.
    #[error("failed to run '{}': {source}", .path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type WrapperResult<T> = Result<T, WrapperError>;
