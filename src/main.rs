use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mysql_sandbox::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use mysql_sandbox::error::{AppError, AppResult, FAILURE_EXIT_CODE};
use mysql_sandbox::mycnf::Network;
use mysql_sandbox::{
    connect, ClientInput, InstanceStatus, Layout, MysqlEngine, Provenance, ProvisionOptions,
    Provisioner,
};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "mysql-sandbox",
    version,
    about = "Provision a standalone, non-privileged MySQL server instance.",
    long_about = "Creates a data/config layout under a base directory, initializes the server \
data directory once, and generates a mysql.sh wrapper that starts the server on demand \
around each client session and stops it afterwards."
)]
struct Cli {
    /// Settings file to use instead of the standard lookup.
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision (or finish provisioning) an instance under BASE_DIR.
    Provision(ProvisionArgs),

    /// Run the mysql client against an instance, starting its server if needed.
    ///
    /// This is what the generated mysql.sh executes.
    Connect {
        base_dir: PathBuf,

        /// Arguments for the mysql client, after `--`.
        #[arg(last = true)]
        args: Vec<OsString>,
    },

    /// Show which provisioning markers exist and the option file contents.
    Status {
        base_dir: PathBuf,

        /// Also report whether this schema exists.
        #[arg(short, long)]
        schema: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug)]
struct ProvisionArgs {
    base_dir: PathBuf,

    /// Create this schema if it does not exist yet.
    #[arg(short, long)]
    schema: Option<String>,

    /// TCP port to listen on, or `none` for the Unix socket only.
    #[arg(short, long, value_name = "PORT|none", default_value = "none")]
    port: Network,

    /// Drop the schema before creating it.
    #[arg(short, long = "drop")]
    drop_first: bool,

    /// Open an interactive client session when done.
    #[arg(short, long)]
    connect: bool,

    /// Optimize tables when done.
    #[arg(short, long)]
    optimize: bool,

    /// Server character set for a new option file.
    #[arg(short = 'r', long)]
    character_set: Option<String>,

    /// Server collation for a new option file.
    #[arg(short = 'l', long)]
    collation: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("mysql-sandbox: {e}");
            return exit_code(FAILURE_EXIT_CODE);
        }
    };
    init_tracing(&settings.logging);

    match run(cli.command, settings) {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("mysql-sandbox: {e}");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn load_settings(path: Option<&Path>) -> AppResult<Config> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader.into_config())
}

/// Logs go to stderr so client output on stdout stays clean.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

fn base_dir_error(base_dir: &Path) -> impl FnOnce(std::io::Error) -> AppError + '_ {
    move |source| AppError::BaseDir {
        path: base_dir.to_path_buf(),
        source,
    }
}

fn run(command: Command, settings: Config) -> AppResult<i32> {
    let engine = MysqlEngine::new(settings.engine.clone());

    match command {
        Command::Provision(args) => {
            let layout = Layout::resolve(&args.base_dir).map_err(base_dir_error(&args.base_dir))?;
            let options = ProvisionOptions {
                schema: args.schema,
                network: args.port,
                drop_first: args.drop_first,
                connect: args.connect,
                optimize: args.optimize,
                character_set: args.character_set,
                collation: args.collation,
                provenance: Provenance::capture(),
            };
            let provisioner = Provisioner::new(&engine, layout, settings);
            let report = provisioner.run(&options)?;
            info!(
                steps = report.executed.len(),
                wrapper = %provisioner.layout().wrapper_path().display(),
                "instance ready"
            );
            Ok(0)
        }
        Command::Connect { base_dir, args } => {
            let layout = Layout::open(&base_dir).map_err(base_dir_error(&base_dir))?;
            let exit = connect(&engine, &layout, &settings.timings, args, ClientInput::Inherit)?;
            Ok(exit.code)
        }
        Command::Status {
            base_dir,
            schema,
            format,
        } => {
            let layout = Layout::open(&base_dir).map_err(base_dir_error(&base_dir))?;
            let status = InstanceStatus::collect(&layout, schema.as_deref())?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Text => print_status(&status),
            }
            Ok(0)
        }
    }
}

fn print_status(status: &InstanceStatus) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("base:             {}", status.base.display());
    println!("option file:      {}", yes_no(status.markers.config_exists));
    println!("data initialized: {}", yes_no(status.markers.data_initialized));
    println!("wrapper:          {}", yes_no(status.markers.wrapper_exists));
    if let Some(exists) = status.markers.schema_exists {
        println!("schema exists:    {}", yes_no(exists));
    }
    println!("server reachable: {}", yes_no(status.server_reachable));

    let mut section = None;
    for entry in &status.option_file {
        if section != Some(entry.section.as_str()) {
            println!("[{}]", entry.section);
            section = Some(entry.section.as_str());
        }
        if entry.value.is_empty() {
            println!("{}", entry.key);
        } else {
            println!("{}={}", entry.key, entry.value);
        }
    }
}
