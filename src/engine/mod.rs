//! Engine abstraction layer over the database's own command-line tools.
//!
//! Provides the `Engine` and `ServerHandle` traits with the real MySQL
//! implementation and an in-process mock, so provisioning and the connect
//! wrapper can be tested without a server.

pub mod error;
pub mod mock;
pub mod mysql;
pub mod traits;

pub use error::EngineError;
pub use mock::{EngineCall, MockEngine, MockServer};
pub use mysql::{MysqlEngine, MysqlServer};
pub use traits::*;
