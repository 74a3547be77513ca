//! MySQL Sandbox Library
//!
//! Provisions a standalone, non-privileged MySQL server instance under a base
//! directory and manages the transient server processes used to talk to it.
//!
//! # Modules
//!
//! - `config`: Tool settings with TOML and environment override support
//! - `layout`: Paths of one provisioned instance
//! - `mycnf`: The server option file, written once
//! - `markers`: On-disk state markers and the provisioning plan
//! - `engine`: Abstraction over the MySQL command-line tools, plus a mock
//! - `wrapper`: The generated connect wrapper and its server lifecycle
//! - `provision`: The provisioner that runs the plan
//! - `publish`: Write-once files published atomically
//! - `signals`: Signal handling while a client session runs
//! - `error`: Unified error handling

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod markers;
pub mod mycnf;
pub mod provision;
pub mod publish;
pub mod signals;
pub mod wrapper;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use engine::{
    ClientExit, ClientInput, ClientInvocation, Engine, EngineError, MockEngine, MysqlEngine,
    ServerHandle, ShutdownOutcome,
};
pub use error::{AppError, AppResult};
pub use layout::Layout;
pub use markers::{plan, MarkerState, Step};
pub use mycnf::{Network, ServerOptions};
pub use provision::{
    InstanceStatus, ProvisionError, ProvisionOptions, ProvisionReport, Provisioner,
};
pub use wrapper::{connect, ConnectState, Provenance, Session, WrapperError};
