//! Mock engine implementation for testing.
//!
//! Provides a `MockEngine` that behaves like the MySQL tools as far as the
//! filesystem is concerned, without running any of them. It reads the option
//! file it is handed to find the data directory and socket, then:
//!
//! - `initialize` creates the `mysql/` marker in the data directory
//! - `spawn_server` creates the socket file (unless told not to), optionally
//!   after a delay as a real server would
//! - shutting a server down removes the socket file
//! - client scripts with `create schema` / `drop schema` create or remove the
//!   schema directory
//!
//! Every call is recorded for inspection.

use super::error::EngineError;
use super::traits::{
    ClientExit, ClientInput, ClientInvocation, Engine, ServerHandle, ShutdownOutcome,
};
use crate::mycnf;
use crate::provision::sql;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// First pid handed out by the mock.
const FIRST_PID: u32 = 40_000;

/// A call made against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Initialize,
    SpawnServer { pid: u32 },
    Client { args: Vec<String>, script: Option<String> },
    Optimize { schema: Option<String> },
    Shutdown { pid: u32 },
}

#[derive(Debug)]
struct MockEngineState {
    calls: Vec<EngineCall>,
    next_pid: u32,
    running: Vec<u32>,
    fail_initialize: bool,
    fail_optimize: bool,
    create_socket_on_spawn: bool,
    socket_delay: Option<Duration>,
    client_delay: Option<Duration>,
    client_exit_code: i32,
}

impl Default for MockEngineState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_pid: FIRST_PID,
            running: Vec::new(),
            fail_initialize: false,
            fail_optimize: false,
            create_socket_on_spawn: true,
            socket_delay: None,
            client_delay: None,
            client_exit_code: 0,
        }
    }
}

/// Mock engine for testing. Clones share state.
///
/// # Example
/// ```
/// use mysql_sandbox::engine::{Engine, MockEngine};
///
/// let engine = MockEngine::new();
/// let tmp = std::env::temp_dir().join("mock-engine-doc.cnf");
/// let _ = engine.spawn_server(&tmp);
/// assert_eq!(engine.spawned_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockEngineState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `initialize` calls fail the way a sandboxed mysqld does.
    pub fn set_fail_initialize(&self, fail: bool) {
        self.state.lock().unwrap().fail_initialize = fail;
    }

    pub fn set_fail_optimize(&self, fail: bool) {
        self.state.lock().unwrap().fail_optimize = fail;
    }

    /// When false, spawned servers never become reachable.
    pub fn set_create_socket_on_spawn(&self, create: bool) {
        self.state.lock().unwrap().create_socket_on_spawn = create;
    }

    /// Create the socket from a background thread this long after spawning,
    /// provided the server has not been shut down by then.
    pub fn set_socket_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().socket_delay = delay;
    }

    /// Keep each client session busy for `delay` before it returns.
    pub fn set_client_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().client_delay = delay;
    }

    /// Exit code every client session reports.
    pub fn set_client_exit_code(&self, code: i32) {
        self.state.lock().unwrap().client_exit_code = code;
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Scripts fed to client sessions, in order.
    pub fn client_scripts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Client {
                    script: Some(script),
                    ..
                } => Some(script),
                _ => None,
            })
            .collect()
    }

    pub fn spawned_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::SpawnServer { .. }))
    }

    pub fn shutdown_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Shutdown { .. }))
    }

    pub fn initialize_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Initialize))
    }

    /// Pids of servers spawned and not yet shut down.
    pub fn running(&self) -> Vec<u32> {
        self.state.lock().unwrap().running.clone()
    }

    fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

/// `datadir` and `socket` from an option file, if it can be read.
fn instance_paths(defaults_file: &Path) -> (Option<PathBuf>, Option<PathBuf>) {
    let entries = mycnf::read_entries(defaults_file).unwrap_or_default();
    let get = |key: &str| mycnf::lookup(&entries, mycnf::SECTION, key).map(PathBuf::from);
    (get("datadir"), get("socket"))
}

fn apply_schema_statements(data_dir: &Path, script: &str) -> std::io::Result<()> {
    for statement in script.split(';') {
        let statement = statement.trim();
        if let Some(rest) = statement.strip_prefix("drop schema if exists ") {
            if let Some(name) = sql::unquote_identifier(rest) {
                let dir = data_dir.join(name);
                if dir.is_dir() {
                    fs::remove_dir_all(dir)?;
                }
            }
        } else if let Some(rest) = statement.strip_prefix("create schema if not exists ") {
            if let Some(name) = sql::unquote_identifier(rest) {
                fs::create_dir_all(data_dir.join(name))?;
            }
        }
    }
    Ok(())
}

impl Engine for MockEngine {
    fn initialize(&self, defaults_file: &Path, log_file: &Path) -> Result<(), EngineError> {
        self.record(EngineCall::Initialize);
        if self.state.lock().unwrap().fail_initialize {
            fs::write(
                log_file,
                "mysqld: Can't create directory (OS errno 13 - Permission denied)\n",
            )?;
            return Err(EngineError::InitializeFailed {
                status: "exit status: 1".to_string(),
                log: log_file.to_path_buf(),
            });
        }
        if let (Some(data_dir), _) = instance_paths(defaults_file) {
            fs::create_dir_all(data_dir.join(crate::layout::INITIALIZED_MARKER))?;
        }
        fs::write(log_file, "[Note] [MY-000000] mock data directory initialized\n")?;
        Ok(())
    }

    fn spawn_server(&self, defaults_file: &Path) -> Result<Box<dyn ServerHandle>, EngineError> {
        let (_, socket) = instance_paths(defaults_file);
        let (pid, create_socket, delay) = {
            let mut state = self.state.lock().unwrap();
            let pid = state.next_pid;
            state.next_pid += 1;
            state.running.push(pid);
            state.calls.push(EngineCall::SpawnServer { pid });
            (pid, state.create_socket_on_spawn, state.socket_delay)
        };
        match (create_socket, socket.clone(), delay) {
            (true, Some(socket), None) => fs::write(socket, b"")?,
            (true, Some(socket), Some(delay)) => {
                let engine = self.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    let state = engine.state.lock().unwrap();
                    if state.running.contains(&pid) {
                        let _ = fs::write(socket, b"");
                    }
                });
            }
            _ => {}
        }
        Ok(Box::new(MockServer {
            pid,
            socket,
            engine: self.clone(),
            stopped: false,
        }))
    }

    fn run_client(&self, invocation: &ClientInvocation) -> Result<ClientExit, EngineError> {
        let script = match &invocation.input {
            ClientInput::Inherit => None,
            ClientInput::Script(sql) => Some(sql.clone()),
        };
        self.record(EngineCall::Client {
            args: invocation
                .args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
            script: script.clone(),
        });
        let (code, delay) = {
            let state = self.state.lock().unwrap();
            (state.client_exit_code, state.client_delay)
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if code == 0 {
            if let (Some(script), (Some(data_dir), _)) =
                (script, instance_paths(&invocation.defaults_file))
            {
                apply_schema_statements(&data_dir, &script)?;
            }
        }
        Ok(ClientExit { code })
    }

    fn optimize(
        &self,
        _defaults_file: &Path,
        _socket: &Path,
        schema: Option<&str>,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Optimize {
            schema: schema.map(str::to_string),
        });
        if self.state.lock().unwrap().fail_optimize {
            return Err(EngineError::command_failed("mysqlcheck", "exit status: 2"));
        }
        Ok(())
    }
}

/// Server handle returned by [`MockEngine::spawn_server`].
#[derive(Debug)]
pub struct MockServer {
    pid: u32,
    socket: Option<PathBuf>,
    engine: MockEngine,
    stopped: bool,
}

impl ServerHandle for MockServer {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn shutdown(&mut self, _timeout: Duration) -> Result<ShutdownOutcome, EngineError> {
        if self.stopped {
            return Ok(ShutdownOutcome::AlreadyExited);
        }
        self.stopped = true;
        {
            let mut state = self.engine.state.lock().unwrap();
            state.running.retain(|&pid| pid != self.pid);
            state.calls.push(EngineCall::Shutdown { pid: self.pid });
        }
        if let Some(ref socket) = self.socket {
            if socket.exists() {
                fs::remove_file(socket)?;
            }
        }
        Ok(ShutdownOutcome::Exited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::mycnf::ServerOptions;

    fn instance() -> (tempfile::TempDir, Layout) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::resolve(tmp.path()).unwrap();
        layout.ensure_dirs().unwrap();
        let options = ServerOptions::new(layout.data_dir(), layout.socket_path());
        mycnf::write_once(&layout.config_file(), &options).unwrap();
        (tmp, layout)
    }

    #[test]
    fn initialize_creates_marker() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();

        engine
            .initialize(&layout.config_file(), &layout.init_log_path())
            .unwrap();

        assert!(layout.initialized_marker().is_dir());
        assert!(layout.init_log_path().is_file());
        assert_eq!(engine.initialize_count(), 1);
    }

    #[test]
    fn server_lifecycle_tracks_socket() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();

        let mut server = engine.spawn_server(&layout.config_file()).unwrap();
        assert!(layout.socket_path().exists());
        assert_eq!(engine.running(), vec![server.pid()]);

        let outcome = server.shutdown(Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, ShutdownOutcome::Exited);
        assert!(!layout.socket_path().exists());
        assert!(engine.running().is_empty());
        assert_eq!(
            server.shutdown(Duration::from_secs(1)).unwrap(),
            ShutdownOutcome::AlreadyExited
        );
    }

    #[test]
    fn delayed_socket_appears_only_for_a_live_server() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();
        engine.set_socket_delay(Some(Duration::from_millis(30)));

        let _server = engine.spawn_server(&layout.config_file()).unwrap();
        assert!(!layout.socket_path().exists());
        thread::sleep(Duration::from_millis(200));
        assert!(layout.socket_path().exists());
        fs::remove_file(layout.socket_path()).unwrap();

        let mut stopped = engine.spawn_server(&layout.config_file()).unwrap();
        stopped.shutdown(Duration::from_secs(1)).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(!layout.socket_path().exists());
    }

    #[test]
    fn schema_scripts_touch_data_dir() {
        let (_tmp, layout) = instance();
        let engine = MockEngine::new();
        let invocation = |sql: &str| ClientInvocation {
            defaults_file: layout.config_file(),
            socket: layout.socket_path(),
            args: vec![],
            input: ClientInput::Script(sql.to_string()),
        };

        engine
            .run_client(&invocation("create schema if not exists `app`;\n"))
            .unwrap();
        assert!(layout.schema_marker("app").is_dir());

        engine
            .run_client(&invocation("drop schema if exists `app`;\n"))
            .unwrap();
        assert!(!layout.schema_marker("app").exists());
        assert_eq!(engine.client_scripts().len(), 2);
    }
}
