//! Core traits for the database engine abstraction.
//!
//! Defines the `Engine` trait that lets the real MySQL tools and the
//! in-process mock be used interchangeably by the provisioner and the
//! connect wrapper.

use super::error::EngineError;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

/// Where a client session reads its input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// Share the caller's stdin (interactive sessions, the wrapper).
    Inherit,
    /// Feed these SQL statements, then close stdin.
    Script(String),
}

/// One run of the database client against the sandboxed server.
#[derive(Debug, Clone)]
pub struct ClientInvocation {
    pub defaults_file: PathBuf,
    pub socket: PathBuf,
    /// Passed through verbatim after the fixed connection arguments.
    pub args: Vec<OsString>,
    pub input: ClientInput,
}

/// Exit status of a client session, shell style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientExit {
    /// Exit code, or `128 + signal` when the client was killed by a signal.
    pub code: i32,
}

impl ClientExit {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

impl From<ExitStatus> for ClientExit {
    fn from(status: ExitStatus) -> Self {
        let code = match (status.code(), status.signal()) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        };
        Self { code }
    }
}

/// How a server process ended after [`ServerHandle::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Exited on its own after the termination signal.
    Exited,
    /// Did not exit within the timeout and was killed.
    Killed,
    /// Had already exited before shutdown was requested.
    AlreadyExited,
}

/// Ownership of a server process started by this program.
pub trait ServerHandle: std::fmt::Debug {
    /// OS process id of the server.
    fn pid(&self) -> u32;

    /// Ask the server to terminate and wait up to `timeout` for it to exit,
    /// killing it forcefully if it does not.
    fn shutdown(&mut self, timeout: Duration) -> Result<ShutdownOutcome, EngineError>;
}

/// The database engine's command-line tools.
pub trait Engine: std::fmt::Debug {
    /// One-shot initialization of an empty data directory with a
    /// password-less root account. Output goes to `log_file`.
    fn initialize(&self, defaults_file: &Path, log_file: &Path) -> Result<(), EngineError>;

    /// Start a server bound to `defaults_file` without waiting for it.
    fn spawn_server(&self, defaults_file: &Path) -> Result<Box<dyn ServerHandle>, EngineError>;

    /// Run the client as root over the socket and block until it exits.
    fn run_client(&self, invocation: &ClientInvocation) -> Result<ClientExit, EngineError>;

    /// Optimize the tables of `schema`, or of every schema when `None`.
    fn optimize(
        &self,
        defaults_file: &Path,
        socket: &Path,
        schema: Option<&str>,
    ) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_exit_success() {
        assert!(ClientExit { code: 0 }.success());
        assert!(!ClientExit { code: 1 }.success());
        assert!(!ClientExit { code: 143 }.success());
    }

    #[test]
    fn exit_status_maps_signals_shell_style() {
        assert_eq!(ClientExit::from(ExitStatus::from_raw(3 << 8)).code, 3);
        assert_eq!(ClientExit::from(ExitStatus::from_raw(libc::SIGTERM)).code, 143);
    }
}
