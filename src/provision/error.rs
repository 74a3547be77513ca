//! Provisioning error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;
use crate::wrapper::WrapperError;

/// Remediation hint for the one external failure mode provisioning expects.
pub const INITIALIZE_HINT: &str = "mysqld could not initialize the data directory. \
This usually means a sandbox or permission restriction (AppArmor, SELinux, a \
container policy or a read-only mount) is blocking it from writing there.";

/// Errors that abort a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A file or directory of the layout could not be created or written.
    #[error("failed to {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One-shot data directory initialization failed.
    #[error("{} Details in {}: {source}", INITIALIZE_HINT, .log.display())]
    Initialization {
        log: PathBuf,
        #[source]
        source: EngineError,
    },

    /// A client session run by a step exited unsuccessfully.
    #[error("{step} failed: client exited with status {code}")]
    ClientFailed { step: String, code: i32 },

    #[error(transparent)]
    Wrapper(#[from] WrapperError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProvisionError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
