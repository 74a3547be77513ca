//! Engine-specific error types.
//!
//! Kept separate from provisioning errors: these describe what went wrong
//! running one of the engine's own tools, not which provisioning step failed.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from running the database engine's tools.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The tool could not be started at all (missing binary, permissions).
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Data directory initialization exited unsuccessfully.
    #[error("data directory initialization failed ({status}); see {}", .log.display())]
    InitializeFailed { status: String, log: PathBuf },

    /// A tool exited unsuccessfully.
    #[error("'{program}' failed ({status})")]
    CommandFailed { program: String, status: String },

    /// Signalling a server process failed.
    #[error("failed to signal server process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred around a tool invocation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn command_failed(program: impl Into<String>, status: impl ToString) -> Self {
        Self::CommandFailed {
            program: program.into(),
            status: status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::command_failed("mysqlcheck", "exit status: 2");
        assert_eq!(err.to_string(), "'mysqlcheck' failed (exit status: 2)");

        let err = EngineError::InitializeFailed {
            status: "exit status: 1".into(),
            log: PathBuf::from("/tmp/x/mysqld_initialize.log"),
        };
        assert!(err.to_string().ends_with("/tmp/x/mysqld_initialize.log"));
    }
}
