//! The connect wrapper.
//!
//! - `script`: renders and writes the `mysql.sh` file
//! - `session`: the start-on-demand, stop-after-use server lifecycle the
//!   script delegates to
//! - `lock`: the start lock that keeps racing wrappers from starting two servers

pub mod error;
pub mod lock;
pub mod script;
pub mod session;

pub use error::{WrapperError, WrapperResult};
pub use lock::StartLock;
pub use script::{
    is_pristine, run_script, shell_quote, write_once, Provenance, WrapperScript,
};
pub use session::{connect, wait_for_socket, ConnectState, Readiness, Session};
