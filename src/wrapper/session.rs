//! Start-on-demand, stop-after-use server lifecycle around one client session.
//!
//! ```text
//! NoServer ──(socket missing: spawn)──> Starting ──(socket / poll ceiling)──> Ready
//! NoServer ──(socket present)─────────────────────────────────────────────> Ready
//! Ready ──(client exits, server owned)──> Stopping ──> NoServer
//! ```
//!
//! Only a session that spawned the server stops it. Reachability is the
//! existence of the socket file; the server is never asked directly.

use std::ffi::OsString;
use std::path::Path;
use std::thread;

use serde::Serialize;
use tracing::{debug, warn};

use super::error::{WrapperError, WrapperResult};
use super::lock::StartLock;
use crate::config::TimingsConfig;
use crate::engine::{
    ClientExit, ClientInput, ClientInvocation, Engine, ServerHandle, ShutdownOutcome,
};
use crate::layout::Layout;
use crate::signals::{self, SignalGuard};

/// Where a session is in the server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectState {
    NoServer,
    Starting,
    Ready,
    Stopping,
}

/// Result of waiting for a socket to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Checks made, including the successful one.
    pub attempts: u32,
    pub reachable: bool,
}

/// Check for `socket` up to `timings.poll_attempts` times, `poll_interval` apart.
pub fn wait_for_socket(socket: &Path, timings: &TimingsConfig) -> Readiness {
    let attempts = timings.poll_attempts.max(1);
    for attempt in 1..=attempts {
        if socket.exists() {
            return Readiness {
                attempts: attempt,
                reachable: true,
            };
        }
        if attempt < attempts {
            thread::sleep(timings.poll_interval());
        }
    }
    Readiness {
        attempts,
        reachable: false,
    }
}

/// One wrapper invocation's hold on a server.
#[derive(Debug)]
pub struct Session<'e, E: Engine + ?Sized> {
    engine: &'e E,
    layout: Layout,
    timings: TimingsConfig,
    state: ConnectState,
    owned: Option<Box<dyn ServerHandle>>,
}

impl<'e, E: Engine + ?Sized> Session<'e, E> {
    /// Make sure a server is reachable, starting one if the socket is missing.
    ///
    /// The check-and-start runs under the instance's start lock. If a started
    /// server does not create its socket within the poll ceiling, a warning is
    /// logged and the session proceeds anyway; the client then fails on its own.
    pub fn open(
        engine: &'e E,
        layout: &Layout,
        timings: &TimingsConfig,
    ) -> WrapperResult<Self> {
        let config_file = layout.config_file();
        if !config_file.is_file() {
            return Err(WrapperError::NotProvisioned(config_file));
        }

        let mut session = Self {
            engine,
            layout: layout.clone(),
            timings: timings.clone(),
            state: ConnectState::NoServer,
            owned: None,
        };

        let _lock = StartLock::acquire(&layout.lock_path())?;
        let socket = layout.socket_path();
        if socket.exists() {
            debug!(socket = %socket.display(), "server already reachable");
            session.state = ConnectState::Ready;
            return Ok(session);
        }

        session.state = ConnectState::Starting;
        let server = engine.spawn_server(&config_file)?;
        debug!(pid = server.pid(), "started server for this session");
        session.owned = Some(server);

        let readiness = wait_for_socket(&socket, timings);
        if readiness.reachable {
            debug!(attempts = readiness.attempts, "server reachable");
        } else {
            warn!(
                socket = %socket.display(),
                attempts = readiness.attempts,
                "server did not become reachable, continuing anyway"
            );
        }
        session.state = ConnectState::Ready;
        Ok(session)
    }

    pub fn state(&self) -> ConnectState {
        self.state
    }

    /// Whether this session started the server and will stop it.
    pub fn owns_server(&self) -> bool {
        self.owned.is_some()
    }

    pub fn owned_pid(&self) -> Option<u32> {
        self.owned.as_ref().map(|s| s.pid())
    }

    /// Run the client against the server with `args` passed through verbatim.
    pub fn run_client(
        &self,
        args: Vec<OsString>,
        input: ClientInput,
    ) -> WrapperResult<ClientExit> {
        let invocation = ClientInvocation {
            defaults_file: self.layout.config_file(),
            socket: self.layout.socket_path(),
            args,
            input,
        };
        Ok(self.engine.run_client(&invocation)?)
    }

    /// Stop the server if this session started it.
    pub fn close(mut self) -> WrapperResult<Option<ShutdownOutcome>> {
        self.stop_owned()
    }

    fn stop_owned(&mut self) -> WrapperResult<Option<ShutdownOutcome>> {
        let Some(mut server) = self.owned.take() else {
            self.state = ConnectState::NoServer;
            return Ok(None);
        };
        self.state = ConnectState::Stopping;
        let pid = server.pid();
        let outcome = server.shutdown(self.timings.drain())?;
        debug!(pid, ?outcome, "stopped session server");
        self.state = ConnectState::NoServer;
        Ok(Some(outcome))
    }
}

impl<E: Engine + ?Sized> Drop for Session<'_, E> {
    fn drop(&mut self) {
        if self.owned.is_some() {
            if let Err(e) = self.stop_owned() {
                warn!("failed to stop session server: {}", e);
            }
        }
    }
}

/// A full wrapper invocation: ensure a server, run the client, stop what we started.
///
/// The server is stopped even when the client could not be run; the client's
/// exit status is returned unchanged.
///
/// Interrupts (SIGINT, SIGQUIT) are left to the client for the whole call.
/// SIGTERM or SIGHUP is passed on to the client; one that arrives before the
/// client starts skips it, and the exit reports the signal shell-style.
pub fn connect<E: Engine + ?Sized>(
    engine: &E,
    layout: &Layout,
    timings: &TimingsConfig,
    args: Vec<OsString>,
    input: ClientInput,
) -> WrapperResult<ClientExit> {
    let _signals = SignalGuard::install().map_err(WrapperError::Signals)?;
    let session = Session::open(engine, layout, timings)?;
    let result = match signals::pending_termination() {
        Some(signal) => {
            warn!(signal, "terminated before the client started");
            Ok(ClientExit { code: 128 + signal })
        }
        None => session.run_client(args, input),
    };
    let closed = session.close();
    let exit = result?;
    closed?;
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, MockEngine};
    use crate::mycnf::{self, ServerOptions};
    use std::time::{Duration, Instant};

    fn fast_timings() -> TimingsConfig {
        TimingsConfig {
            poll_interval_ms: 5,
            poll_attempts: 20,
            settle_ms: 0,
            drain_ms: 10,
        }
    }

    fn instance() -> (tempfile::TempDir, Layout) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::resolve(tmp.path()).unwrap();
        layout.ensure_dirs().unwrap();
        let options = ServerOptions::new(layout.data_dir(), layout.socket_path());
        mycnf::write_once(&layout.config_file(), &options).unwrap();
        (tmp, layout)
    }

    #[test]
    fn wait_gives_up_after_ceiling() {
        let tmp = tempfile::tempdir().unwrap();
        let timings = TimingsConfig {
            poll_interval_ms: 10,
            poll_attempts: 3,
            ..fast_timings()
        };

        let started = Instant::now();
        let readiness = wait_for_socket(&tmp.path().join("none.sock"), &timings);

        assert_eq!(
            readiness,
            Readiness {
                attempts: 3,
                reachable: false
            }
        );
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_returns_on_first_hit() {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("up.sock");
        std::fs::write(&socket, b"").unwrap();

        let readiness = wait_for_socket(&socket, &fast_timings());
        assert_eq!(readiness.attempts, 1);
        assert!(readiness.reachable);
    }

    #[test]
    fn open_starts_server_when_unreachable() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();

        let session = Session::open(&engine, &layout, &fast_timings()).unwrap();
        assert_eq!(session.state(), ConnectState::Ready);
        assert!(session.owns_server());
        assert_eq!(engine.spawned_count(), 1);

        let outcome = session.close().unwrap();
        assert_eq!(outcome, Some(ShutdownOutcome::Exited));
        assert_eq!(engine.shutdown_count(), 1);
        assert!(!layout.socket_path().exists());
    }

    #[test]
    fn open_reuses_reachable_server() {
        let (_tmp, layout) = instance();
        std::fs::write(layout.socket_path(), b"").unwrap();
        let engine = MockEngine::new();

        let session = Session::open(&engine, &layout, &fast_timings()).unwrap();
        assert!(!session.owns_server());
        assert_eq!(session.owned_pid(), None);
        assert_eq!(session.close().unwrap(), None);

        assert!(engine.calls().is_empty());
        assert!(layout.socket_path().exists());
    }

    #[test]
    fn open_requires_option_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::resolve(tmp.path()).unwrap();
        let engine = MockEngine::new();

        let err = Session::open(&engine, &layout, &fast_timings()).unwrap_err();
        assert!(matches!(err, WrapperError::NotProvisioned(_)));
        assert_eq!(engine.spawned_count(), 0);
    }

    #[test]
    fn dropping_an_owning_session_stops_the_server() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();

        {
            let _session = Session::open(&engine, &layout, &fast_timings()).unwrap();
            assert_eq!(engine.running().len(), 1);
        }

        assert!(engine.running().is_empty());
        assert_eq!(engine.shutdown_count(), 1);
    }

    #[test]
    fn connect_forwards_args_and_exit_code() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();
        engine.set_client_exit_code(3);

        let exit = connect(
            &engine,
            &layout,
            &fast_timings(),
            vec!["-e".into(), "select 1".into()],
            ClientInput::Inherit,
        )
        .unwrap();

        assert_eq!(exit.code, 3);
        let calls = engine.calls();
        assert!(matches!(calls[0], EngineCall::SpawnServer { .. }));
        assert_eq!(
            calls[1],
            EngineCall::Client {
                args: vec!["-e".to_string(), "select 1".to_string()],
                script: None
            }
        );
        assert!(matches!(calls[2], EngineCall::Shutdown { .. }));
    }
}
