//! Provisioning of one sandboxed instance.
//!
//! [`Provisioner::run`] inspects the instance's markers, plans the steps still
//! needed and runs them in order. Every step is individually idempotent, so a
//! run that was interrupted part way is finished by simply running again.
//!
//! # Architecture
//!
//! ```text
//! CLI ──> Provisioner ──> markers::plan ──> Steps
//!                 │
//!                 ├──> mycnf / wrapper::script   (files, written once)
//!                 ├──> mysql.sh / connect        (schema, interactive connect)
//!                 └──> Engine                    (initialize, optimize)
//! ```

pub mod error;
pub mod sql;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;

use serde::Serialize;
use tracing::{debug, error, info, warn};

pub use error::{ProvisionError, ProvisionResult, INITIALIZE_HINT};

use crate::config::Config;
use crate::engine::{ClientInput, Engine};
use crate::layout::Layout;
use crate::markers::{self, MarkerState, Step};
use crate::mycnf::{self, Entry, Network, ServerOptions, WriteOutcome};
use crate::signals::SignalGuard;
use crate::wrapper::{self, Provenance, WrapperError, WrapperScript};

/// What a provisioning run should do beyond the always-on layout steps.
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Schema to create if missing.
    pub schema: Option<String>,
    pub network: Network,
    /// Drop the schema before creating it, even if it exists.
    pub drop_first: bool,
    /// Open an interactive client session afterwards.
    pub connect: bool,
    /// Optimize tables afterwards.
    pub optimize: bool,
    /// Overrides the settings default; only used when the option file is new.
    pub character_set: Option<String>,
    /// Overrides the settings default; only used when the option file is new.
    pub collation: Option<String>,
    /// Recorded in the wrapper header.
    pub provenance: Provenance,
}

/// What a run found and did.
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub markers_before: MarkerState,
    pub executed: Vec<Step>,
}

/// Runs provisioning steps for one instance.
#[derive(Debug)]
pub struct Provisioner<'e, E: Engine + ?Sized> {
    engine: &'e E,
    layout: Layout,
    settings: Config,
    executable: PathBuf,
}

impl<'e, E: Engine + ?Sized> Provisioner<'e, E> {
    /// The wrapper will delegate to the current executable; see [`Self::with_executable`].
    pub fn new(engine: &'e E, layout: Layout, settings: Config) -> Self {
        let executable =
            std::env::current_exe().unwrap_or_else(|_| PathBuf::from(env!("CARGO_PKG_NAME")));
        Self {
            engine,
            layout,
            settings,
            executable,
        }
    }

    /// Binary the generated wrapper `exec`s.
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Bring the instance to the state `options` asks for.
    ///
    /// # Errors
    ///
    /// - `ProvisionError::Initialization` if the engine refuses to initialize
    ///   the data directory
    /// - `ProvisionError::ClientFailed` if a schema or connect session exits
    ///   unsuccessfully
    /// - any I/O, wrapper or engine error from a step; later steps do not run
    pub fn run(&self, options: &ProvisionOptions) -> ProvisionResult<ProvisionReport> {
        let markers_before = MarkerState::inspect(&self.layout, options.schema.as_deref());
        if markers_before.config_exists {
            self.warn_unapplied(options);
        }

        let steps = markers::plan(&markers_before, options);
        debug!(?markers_before, steps = steps.len(), "provisioning plan ready");

        let mut report = ProvisionReport {
            markers_before,
            executed: Vec::with_capacity(steps.len()),
        };
        for step in steps {
            info!(%step, base = %self.layout.base().display(), "provisioning step");
            self.execute(&step, options)?;
            report.executed.push(step);
        }
        Ok(report)
    }

    fn execute(&self, step: &Step, options: &ProvisionOptions) -> ProvisionResult<()> {
        match step {
            Step::EnsureDirs => {
                self.layout.ensure_dirs().map_err(|e| {
                    ProvisionError::io("create directories under", self.layout.base(), e)
                })?;
            }
            Step::WriteConfig => self.write_config(options)?,
            Step::InitializeData => self.initialize_data()?,
            Step::WriteWrapper => self.write_wrapper(options)?,
            Step::CreateSchema { name, drop_first } => {
                let script = sql::schema_script(name, *drop_first);
                let input = ClientInput::Script(script);
                self.run_through_wrapper(step, options, Vec::new(), input)?;
            }
            Step::Connect { schema } => {
                let args: Vec<OsString> = schema
                    .iter()
                    .map(|s| format!("--database={s}").into())
                    .collect();
                self.run_through_wrapper(step, options, args, ClientInput::Inherit)?;
            }
            Step::Optimize { schema } => self.optimize(schema.as_deref())?,
        }
        Ok(())
    }

    /// Options for a brand-new option file.
    pub fn server_options(&self, options: &ProvisionOptions) -> ServerOptions {
        let defaults = &self.settings.defaults;
        ServerOptions {
            data_dir: self.layout.data_dir(),
            socket: self.layout.socket_path(),
            max_connections: defaults.max_connections,
            file_per_table: true,
            character_set: options
                .character_set
                .clone()
                .unwrap_or_else(|| defaults.character_set.clone()),
            collation: options
                .collation
                .clone()
                .unwrap_or_else(|| defaults.collation.clone()),
            network: options.network,
        }
    }

    fn write_config(&self, options: &ProvisionOptions) -> ProvisionResult<()> {
        let path = self.layout.config_file();
        let outcome = mycnf::write_once(&path, &self.server_options(options))
            .map_err(|e| ProvisionError::io("write option file", &path, e))?;
        if outcome == WriteOutcome::AlreadyPresent {
            debug!(
                path = %path.display(),
                "option file appeared concurrently, left as is"
            );
        }
        Ok(())
    }

    fn initialize_data(&self) -> ProvisionResult<()> {
        let log = self.layout.init_log_path();
        self.engine
            .initialize(&self.layout.config_file(), &log)
            .map_err(|source| {
                error!(log = %log.display(), "{}", INITIALIZE_HINT);
                ProvisionError::Initialization {
                    log: log.clone(),
                    source,
                }
            })
    }

    fn wrapper_script(&self, options: &ProvisionOptions) -> WrapperScript {
        WrapperScript::for_layout(
            &self.layout,
            self.executable.clone(),
            options.provenance.clone(),
        )
    }

    fn write_wrapper(&self, options: &ProvisionOptions) -> ProvisionResult<()> {
        let script = self.wrapper_script(options);
        wrapper::write_once(&self.layout.wrapper_path(), &script)?;
        Ok(())
    }

    /// Run a client session the way `mysql.sh` would. A wrapper that still
    /// runs what this provisioner renders is followed in-process; one whose
    /// commands were edited is executed as is.
    fn run_through_wrapper(
        &self,
        step: &Step,
        options: &ProvisionOptions,
        args: Vec<OsString>,
        input: ClientInput,
    ) -> ProvisionResult<()> {
        let path = self.layout.wrapper_path();
        let customized = match fs::read_to_string(&path) {
            Ok(text) => !wrapper::is_pristine(&text, &self.wrapper_script(options)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(ProvisionError::io("read wrapper script", &path, e)),
        };

        let exit = if customized {
            info!(path = %path.display(), "wrapper script was edited; running it");
            wrapper::run_script(&path, args, input)?
        } else {
            let timings = &self.settings.timings;
            wrapper::connect(self.engine, &self.layout, timings, args, input)?
        };
        if exit.success() {
            Ok(())
        } else {
            Err(ProvisionError::ClientFailed {
                step: step.to_string(),
                code: exit.code,
            })
        }
    }

    /// Start a server directly, optimize, stop it. The server is stopped even
    /// when optimizing fails.
    fn optimize(&self, schema: Option<&str>) -> ProvisionResult<()> {
        let socket = self.layout.socket_path();
        if socket.exists() {
            warn!(
                socket = %socket.display(),
                "a server seems to be running already; starting another for optimize"
            );
        }
        let _signals = SignalGuard::install().map_err(WrapperError::Signals)?;

        let config_file = self.layout.config_file();
        let mut server = self.engine.spawn_server(&config_file)?;
        info!(pid = server.pid(), "started server for optimize");
        thread::sleep(self.settings.timings.settle());

        let result = self.engine.optimize(&config_file, &socket, schema);
        let stopped = server.shutdown(self.settings.timings.drain());
        result?;
        let outcome = stopped?;
        info!(?outcome, "stopped optimize server");
        Ok(())
    }

    fn warn_unapplied(&self, options: &ProvisionOptions) {
        let mut ignored = Vec::new();
        if options.character_set.is_some() {
            ignored.push("character set");
        }
        if options.collation.is_some() {
            ignored.push("collation");
        }
        if options.network != Network::default() {
            ignored.push("port");
        }
        if !ignored.is_empty() {
            warn!(
                path = %self.layout.config_file().display(),
                "option file already exists; requested {} not applied",
                ignored.join(", ")
            );
        }
    }
}

/// Snapshot of an instance for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub base: PathBuf,
    pub markers: MarkerState,
    pub server_reachable: bool,
    pub option_file: Vec<Entry>,
}

impl InstanceStatus {
    pub fn collect(layout: &Layout, schema: Option<&str>) -> ProvisionResult<Self> {
        let markers = MarkerState::inspect(layout, schema);
        let option_file = if markers.config_exists {
            mycnf::read_entries(&layout.config_file())
                .map_err(|e| ProvisionError::io("read option file", layout.config_file(), e))?
        } else {
            Vec::new()
        };
        Ok(Self {
            base: layout.base().to_path_buf(),
            markers,
            server_reachable: layout.socket_path().exists(),
            option_file,
        })
    }
}
