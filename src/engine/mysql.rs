//! The real engine: MySQL's own `mysqld`, `mysql` and `mysqlcheck` tools.

use super::error::EngineError;
use super::traits::{
    ClientExit, ClientInput, ClientInvocation, Engine, ServerHandle, ShutdownOutcome,
};
use crate::config::EngineConfig;
use crate::signals;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The client always connects as root; the instance has no root password.
const CLIENT_USER: &str = "--user=root";

/// How often a stopping server is checked for exit.
const EXIT_POLL: Duration = Duration::from_millis(50);

fn defaults_arg(defaults_file: &Path) -> OsString {
    // mysqld only honours --defaults-file as the very first argument.
    let mut arg = OsString::from("--defaults-file=");
    arg.push(defaults_file);
    arg
}

fn socket_arg(socket: &Path) -> OsString {
    let mut arg = OsString::from("--socket=");
    arg.push(socket);
    arg
}

/// Engine backed by the MySQL binaries named in the settings.
#[derive(Debug, Clone)]
pub struct MysqlEngine {
    binaries: EngineConfig,
}

impl MysqlEngine {
    pub fn new(binaries: EngineConfig) -> Self {
        Self { binaries }
    }
}

impl Engine for MysqlEngine {
    fn initialize(&self, defaults_file: &Path, log_file: &Path) -> Result<(), EngineError> {
        let log = OpenOptions::new().create(true).append(true).open(log_file)?;
        let log_err = log.try_clone()?;

        info!(log = %log_file.display(), "initializing data directory");
        let status = Command::new(&self.binaries.mysqld)
            .arg(defaults_arg(defaults_file))
            .arg("--initialize-insecure")
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .map_err(|e| EngineError::spawn(&self.binaries.mysqld, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::InitializeFailed {
                status: status.to_string(),
                log: log_file.to_path_buf(),
            })
        }
    }

    fn spawn_server(&self, defaults_file: &Path) -> Result<Box<dyn ServerHandle>, EngineError> {
        // Own process group, so a Ctrl-C aimed at the client does not reach the server.
        let child = Command::new(&self.binaries.mysqld)
            .arg(defaults_arg(defaults_file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| EngineError::spawn(&self.binaries.mysqld, e))?;

        debug!(pid = child.id(), "server process spawned");
        Ok(Box::new(MysqlServer { child }))
    }

    fn run_client(&self, invocation: &ClientInvocation) -> Result<ClientExit, EngineError> {
        let mut command = Command::new(&self.binaries.mysql);
        command
            .arg(defaults_arg(&invocation.defaults_file))
            .arg(CLIENT_USER)
            .arg(socket_arg(&invocation.socket))
            .args(&invocation.args);

        if let ClientInput::Script(_) = invocation.input {
            command.stdin(Stdio::piped());
        }
        let mut child = command
            .spawn()
            .map_err(|e| EngineError::spawn(&self.binaries.mysql, e))?;
        let _forward = signals::forward_to(child.id());
        let written = match (&invocation.input, child.stdin.take()) {
            (ClientInput::Script(sql), Some(mut stdin)) => stdin.write_all(sql.as_bytes()),
            _ => Ok(()),
        };
        let status = child.wait()?;

        match written {
            // A client that quits early reports its own failure through its status.
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e.into()),
            _ => Ok(ClientExit::from(status)),
        }
    }

    fn optimize(
        &self,
        defaults_file: &Path,
        socket: &Path,
        schema: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut command = Command::new(&self.binaries.mysqlcheck);
        command
            .arg(defaults_arg(defaults_file))
            .arg(CLIENT_USER)
            .arg(socket_arg(socket))
            .arg("--optimize");
        match schema {
            Some(name) => command.arg("--databases").arg(name),
            None => command.arg("--all-databases"),
        };

        let mut child = command
            .spawn()
            .map_err(|e| EngineError::spawn(&self.binaries.mysqlcheck, e))?;
        let _forward = signals::forward_to(child.id());
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(EngineError::command_failed(&self.binaries.mysqlcheck, status))
        }
    }
}

/// A `mysqld` child process owned by this program.
#[derive(Debug)]
pub struct MysqlServer {
    child: Child,
}

impl MysqlServer {
    fn terminate(&self) -> Result<(), EngineError> {
        let pid = self.child.id();
        // SAFETY: kill(2) with a pid we spawned and have not yet reaped.
        let res = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if res == 0 {
            Ok(())
        } else {
            Err(EngineError::Signal {
                pid,
                source: std::io::Error::last_os_error(),
            })
        }
    }
}

impl ServerHandle for MysqlServer {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn shutdown(&mut self, timeout: Duration) -> Result<ShutdownOutcome, EngineError> {
        if self.child.try_wait()?.is_some() {
            return Ok(ShutdownOutcome::AlreadyExited);
        }

        self.terminate()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!(pid = self.pid(), %status, "server exited");
                return Ok(ShutdownOutcome::Exited);
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(EXIT_POLL);
        }

        warn!(
            pid = self.pid(),
            "server did not exit within {:?}, killing it", timeout
        );
        self.child.kill()?;
        self.child.wait()?;
        Ok(ShutdownOutcome::Killed)
    }
}
