//! On-disk layout of one provisioned instance.
//!
//! ```text
//! <base>/
//!   data/                   engine-owned state
//!     mysql/                present once the data directory is initialized
//!     <schema>/             present once a schema exists
//!   conf/
//!     mysql.cnf             server option file
//!     mysql.sock            runtime socket
//!     mysql.lock            wrapper start lock
//!   mysql.sh                generated connect wrapper
//!   mysqld_initialize.log   first-run initialization log
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR: &str = "data";
const CONF_DIR: &str = "conf";
const CONFIG_FILE: &str = "mysql.cnf";
const WRAPPER_FILE: &str = "mysql.sh";
const INIT_LOG_FILE: &str = "mysqld_initialize.log";
const LOCK_FILE: &str = "mysql.lock";

/// Subdirectory the engine creates inside the data directory on initialization.
pub const INITIALIZED_MARKER: &str = "mysql";

/// All paths derived from a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    /// Build a layout for an already-absolute base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve `base` to its canonical absolute form, creating it if needed.
    pub fn resolve(base: impl AsRef<Path>) -> io::Result<Self> {
        let base = base.as_ref();
        fs::create_dir_all(base)?;
        Ok(Self::new(fs::canonicalize(base)?))
    }

    /// Resolve an existing base directory to its canonical absolute form.
    pub fn open(base: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(fs::canonicalize(base)?))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join(DATA_DIR)
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.base.join(CONF_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.conf_dir().join(CONFIG_FILE)
    }

    /// The socket sits next to the option file, same stem, `.sock` extension.
    pub fn socket_path(&self) -> PathBuf {
        self.config_file().with_extension("sock")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.conf_dir().join(LOCK_FILE)
    }

    pub fn wrapper_path(&self) -> PathBuf {
        self.base.join(WRAPPER_FILE)
    }

    pub fn init_log_path(&self) -> PathBuf {
        self.base.join(INIT_LOG_FILE)
    }

    pub fn initialized_marker(&self) -> PathBuf {
        self.data_dir().join(INITIALIZED_MARKER)
    }

    /// Directory the engine keeps for a schema of this name.
    pub fn schema_marker(&self, schema: &str) -> PathBuf {
        self.data_dir().join(schema)
    }

    /// Create `data/` and `conf/` if missing. Returns true if anything was created.
    pub fn ensure_dirs(&self) -> io::Result<bool> {
        let mut created = false;
        for dir in [self.data_dir(), self.conf_dir()] {
            if !dir.is_dir() {
                fs::create_dir_all(&dir)?;
                created = true;
            }
        }
        Ok(created)
    }
}
