//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use mysql_sandbox::config::Config;
use mysql_sandbox::{Layout, MockEngine, ProvisionOptions, Provisioner};
use tempfile::TempDir;

/// Executable recorded in generated wrappers during tests.
pub const TEST_EXECUTABLE: &str = "/usr/local/bin/mysql-sandbox";

/// Settings with timings short enough for tests.
pub fn quick_settings() -> Config {
    let mut settings = Config::default();
    settings.timings.poll_interval_ms = 5;
    settings.timings.poll_attempts = 20;
    settings.timings.settle_ms = 0;
    settings.timings.drain_ms = 50;
    settings
}

/// A temporary base directory, `<tmp>/x`, that is removed on drop.
pub struct TestInstance {
    pub tmp: TempDir,
    pub layout: Layout,
}

impl TestInstance {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let layout = Layout::resolve(tmp.path().join("x")).expect("Failed to resolve base dir");
        Self { tmp, layout }
    }

    pub fn provisioner<'e>(&self, engine: &'e MockEngine) -> Provisioner<'e, MockEngine> {
        Provisioner::new(engine, self.layout.clone(), quick_settings())
            .with_executable(TEST_EXECUTABLE)
    }

    pub fn option_file(&self) -> String {
        fs::read_to_string(self.layout.config_file()).expect("Failed to read option file")
    }

    pub fn wrapper(&self) -> String {
        fs::read_to_string(self.layout.wrapper_path()).expect("Failed to read wrapper")
    }
}

/// Provisioning options asking for `schema`.
pub fn with_schema(schema: &str) -> ProvisionOptions {
    ProvisionOptions {
        schema: Some(schema.to_string()),
        ..Default::default()
    }
}

/// Write an executable shell script.
pub fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("Failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
}

/// Shell stand-ins for `mysqld`, `mysql` and `mysqlcheck`.
///
/// The fake server creates the socket named in the option file and removes
/// it on SIGTERM. The fake client appends whatever it reads from stdin to
/// `<dir>/client.log` and creates a directory for every schema it is asked
/// to create. With `FAKE_CLIENT_HOLD` set it then touches that file and
/// stays up until interrupted, logging `client-got-int`.
pub struct FakeEngine {
    pub dir: PathBuf,
}

const FAKE_MYSQLD: &str = r#"#!/bin/sh
cnf="${1#--defaults-file=}"
datadir=$(sed -n 's/^datadir=//p' "$cnf")
socket=$(sed -n 's/^socket=//p' "$cnf")
if [ "$2" = "--initialize-insecure" ]; then
    mkdir -p "$datadir/mysql"
    echo "fake mysqld: initialized $datadir"
    exit 0
fi
trap 'rm -f "$socket"; exit 0' TERM
: > "$socket"
while :; do sleep 0.05; done
"#;

const FAKE_MYSQL: &str = r#"#!/bin/sh
cnf="${1#--defaults-file=}"
datadir=$(sed -n 's/^datadir=//p' "$cnf")
log="$(dirname "$0")/client.log"
echo "args: $*" >> "$log"
input=$(cat)
printf '%s\n' "$input" >> "$log"
pattern='s/^create schema if not exists `\(.*\)`;$/\1/p'
printf '%s\n' "$input" | sed -n "$pattern" | while read -r name; do
    mkdir -p "$datadir/$name"
done
if [ -n "$FAKE_CLIENT_HOLD" ]; then
    done=0
    trap 'echo client-got-int >> "$log"; done=1' INT
    : > "$FAKE_CLIENT_HOLD"
    while [ "$done" = 0 ]; do sleep 0.05; done
fi
exit 0
"#;

const FAKE_MYSQLCHECK: &str = r#"#!/bin/sh
echo "args: $*" >> "$(dirname "$0")/mysqlcheck.log"
exit 0
"#;

impl FakeEngine {
    pub fn install(dir: &Path) -> Self {
        fs::create_dir_all(dir).expect("Failed to create fake engine dir");
        write_script(&dir.join("mysqld"), FAKE_MYSQLD);
        write_script(&dir.join("mysql"), FAKE_MYSQL);
        write_script(&dir.join("mysqlcheck"), FAKE_MYSQLCHECK);
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// A settings file pointing the engine at the fakes.
    pub fn write_settings(&self, path: &Path) {
        let text = format!(
            r#"[engine]
mysqld = "{}"
mysql = "{}"
mysqlcheck = "{}"

[timings]
poll_interval_ms = 20
poll_attempts = 100
settle_ms = 0
drain_ms = 2000

[logging]
level = "debug"
"#,
            self.dir.join("mysqld").display(),
            self.dir.join("mysql").display(),
            self.dir.join("mysqlcheck").display(),
        );
        fs::write(path, text).expect("Failed to write settings");
    }

    pub fn client_log(&self) -> String {
        fs::read_to_string(self.dir.join("client.log")).unwrap_or_default()
    }

    pub fn mysqlcheck_log(&self) -> String {
        fs::read_to_string(self.dir.join("mysqlcheck.log")).unwrap_or_default()
    }
}
