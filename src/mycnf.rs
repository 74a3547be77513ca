//! The server option file (`conf/mysql.cnf`).
//!
//! The file is written exactly once. Its absence is what marks a fresh
//! instance; once present it belongs to the operator and is never rewritten,
//! so manual edits survive reruns.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::config::{DEFAULT_CHARACTER_SET, DEFAULT_COLLATION, DEFAULT_MAX_CONNECTIONS};
use crate::publish::publish_new;
pub use crate::publish::WriteOutcome;

/// Section header of the only section written.
pub const SECTION: &str = "mysqld";

/// How the server listens besides its Unix socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Unix socket only (`skip-networking`).
    #[default]
    SkipNetworking,
    /// Also listen on this TCP port.
    Port(u16),
}

impl FromStr for Network {
    type Err = String;

    /// Accepts a port number, or `none` / `0` for socket-only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::SkipNetworking);
        }
        match s.parse::<u16>() {
            Ok(0) => Ok(Self::SkipNetworking),
            Ok(port) => Ok(Self::Port(port)),
            Err(_) => Err(format!("'{s}' is not a port number or 'none'")),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipNetworking => write!(f, "none"),
            Self::Port(port) => write!(f, "{port}"),
        }
    }
}

/// Everything that goes into a new option file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub data_dir: PathBuf,
    pub socket: PathBuf,
    pub max_connections: u32,
    pub file_per_table: bool,
    pub character_set: String,
    pub collation: String,
    pub network: Network,
}

impl ServerOptions {
    /// Options with the built-in defaults for the given paths.
    pub fn new(data_dir: impl Into<PathBuf>, socket: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            socket: socket.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            file_per_table: true,
            character_set: DEFAULT_CHARACTER_SET.to_string(),
            collation: DEFAULT_COLLATION.to_string(),
            network: Network::SkipNetworking,
        }
    }

    /// Render the option file contents.
    pub fn render(&self) -> String {
        let mut out = format!("[{SECTION}]\n");
        out.push_str(&format!("datadir={}\n", self.data_dir.display()));
        out.push_str(&format!("socket={}\n", self.socket.display()));
        out.push_str(&format!("max_connections={}\n", self.max_connections));
        out.push_str(&format!(
            "innodb_file_per_table={}\n",
            u8::from(self.file_per_table)
        ));
        out.push_str(&format!("character-set-server={}\n", self.character_set));
        out.push_str(&format!("collation-server={}\n", self.collation));
        match self.network {
            Network::SkipNetworking => out.push_str("skip-networking\n"),
            Network::Port(port) => out.push_str(&format!("port={port}\n")),
        }
        out
    }
}

/// Mode of a new option file.
const OPTION_FILE_MODE: u32 = 0o644;

/// Write the option file unless one already exists.
///
/// A partially written file is never left at `path`.
pub fn write_once(path: &Path, options: &ServerOptions) -> io::Result<WriteOutcome> {
    publish_new(path, options.render().as_bytes(), OPTION_FILE_MODE)
}

/// One `key[=value]` line of an option file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub section: String,
    pub key: String,
    /// Empty for bare flags such as `skip-networking`.
    pub value: String,
}

/// Parse option file text into entries. Comments and blank lines are skipped.
pub fn parse(text: &str) -> Vec<Entry> {
    let mut section = String::new();
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (line, ""),
        };
        entries.push(Entry {
            section: section.clone(),
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    entries
}

/// Read and parse an existing option file.
pub fn read_entries(path: &Path) -> io::Result<Vec<Entry>> {
    Ok(parse(&fs::read_to_string(path)?))
}

/// Look up the first value for `key` in `section`.
pub fn lookup<'a>(entries: &'a [Entry], section: &str, key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|e| e.section == section && e.key == key)
        .map(|e| e.value.as_str())
}
