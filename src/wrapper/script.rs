//! The generated `mysql.sh` connect wrapper.
//!
//! The script itself holds no logic: it records where the instance lives and
//! how it was created, then `exec`s `mysql-sandbox connect`, which runs the
//! start-on-demand session. Arguments, stdin, stdout and the exit status pass
//! through unchanged.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, SecondsFormat, Utc};

use super::error::{WrapperError, WrapperResult};
use crate::engine::{ClientExit, ClientInput};
use crate::layout::Layout;
use crate::publish::{publish_new, WriteOutcome};
use crate::signals::{self, SignalGuard};

const SCRIPT_MODE: u32 = 0o755;

/// The command line and working directory a wrapper was created from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub command_line: Vec<OsString>,
    pub cwd: PathBuf,
}

impl Provenance {
    /// Capture the current process's command line and working directory.
    pub fn capture() -> Self {
        Self {
            command_line: std::env::args_os().collect(),
            cwd: std::env::current_dir().unwrap_or_default(),
        }
    }
}

/// Everything rendered into a wrapper script.
#[derive(Debug, Clone)]
pub struct WrapperScript {
    /// The `mysql-sandbox` binary the script delegates to.
    pub executable: PathBuf,
    pub base: PathBuf,
    pub config_file: PathBuf,
    pub socket: PathBuf,
    pub provenance: Provenance,
    pub generated_at: DateTime<Utc>,
}

impl WrapperScript {
    pub fn for_layout(layout: &Layout, executable: PathBuf, provenance: Provenance) -> Self {
        Self {
            executable,
            base: layout.base().to_path_buf(),
            config_file: layout.config_file(),
            socket: layout.socket_path(),
            provenance,
            generated_at: Utc::now(),
        }
    }

    pub fn render(&self) -> String {
        let command = self
            .provenance
            .command_line
            .iter()
            .map(|arg| shell_quote(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");

        let mut out = String::from("#!/bin/sh\n");
        out.push_str("# mysql.sh: connect to the sandboxed MySQL server, starting it on demand.\n");
        out.push_str("#\n");
        out.push_str("# Usage: mysql.sh [mysql client arguments...]\n");
        out.push_str("#   Arguments, stdin and stdout go to the mysql client unchanged. If no\n");
        out.push_str("#   server is listening on the socket below, one is started for this\n");
        out.push_str("#   session and stopped again when the client exits.\n");
        out.push_str("#\n");
        out.push_str("#   This file is never regenerated. The mysql-sandbox path on the exec\n");
        out.push_str("#   line is absolute; edit it if the binary is moved or reinstalled.\n");
        out.push_str("#\n");
        out.push_str(&format!(
            "# config:    {}\n",
            comment_safe(&self.config_file.to_string_lossy())
        ));
        out.push_str(&format!(
            "# socket:    {}\n",
            comment_safe(&self.socket.to_string_lossy())
        ));
        out.push_str(&format!(
            "# generated: {}\n",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        out.push_str(&format!("# command:   {}\n", comment_safe(&command)));
        out.push_str(&format!(
            "# cwd:       {}\n",
            comment_safe(&self.provenance.cwd.to_string_lossy())
        ));
        out.push_str(&format!(
            "exec {} connect {} -- \"$@\"\n",
            shell_quote(&self.executable.to_string_lossy()),
            shell_quote(&self.base.to_string_lossy())
        ));
        out
    }
}

/// Write the wrapper unless one already exists; new files are made executable.
pub fn write_once(path: &Path, script: &WrapperScript) -> WrapperResult<WriteOutcome> {
    publish_new(path, script.render().as_bytes(), SCRIPT_MODE).map_err(|source| {
        WrapperError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Lines that do something when the script runs.
fn command_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Whether `text` runs exactly what `script` would render. Comments and
/// blank lines are ignored, so only a changed command counts as customized.
pub fn is_pristine(text: &str, script: &WrapperScript) -> bool {
    let rendered = script.render();
    command_lines(text).eq(command_lines(&rendered))
}

/// Run the wrapper file itself as a child process and wait for it.
pub fn run_script(
    path: &Path,
    args: Vec<OsString>,
    input: ClientInput,
) -> WrapperResult<ClientExit> {
    let exec_err = |source: io::Error| WrapperError::Exec {
        path: path.to_path_buf(),
        source,
    };
    let _signals = SignalGuard::install().map_err(WrapperError::Signals)?;

    let mut command = Command::new(path);
    command.args(&args);
    if let ClientInput::Script(_) = input {
        command.stdin(Stdio::piped());
    }
    let mut child = command.spawn().map_err(exec_err)?;
    let _forward = signals::forward_to(child.id());
    let written = match (&input, child.stdin.take()) {
        (ClientInput::Script(sql), Some(mut stdin)) => stdin.write_all(sql.as_bytes()),
        _ => Ok(()),
    };
    let status = child.wait().map_err(exec_err)?;

    match written {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(exec_err(e)),
        _ => Ok(ClientExit::from(status)),
    }
}

/// Quote `s` for POSIX sh. Plain words are left as they are.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

fn comment_safe(s: &str) -> String {
    s.replace('\r', "\\r").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script() -> WrapperScript {
        WrapperScript {
            executable: PathBuf::from("/usr/local/bin/mysql-sandbox"),
            base: PathBuf::from("/tmp/x"),
            config_file: PathBuf::from("/tmp/x/conf/mysql.cnf"),
            socket: PathBuf::from("/tmp/x/conf/mysql.sock"),
            provenance: Provenance {
                command_line: ["mysql-sandbox", "provision", "/tmp/x", "-s", "my db"]
                    .into_iter()
                    .map(OsString::from)
                    .collect(),
                cwd: PathBuf::from("/home/dev"),
            },
            generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn render_records_provenance_and_delegates() {
        let text = script().render();
        assert!(text.starts_with("#!/bin/sh\n"));
        assert!(text.contains("# config:    /tmp/x/conf/mysql.cnf\n"));
        assert!(text.contains("# socket:    /tmp/x/conf/mysql.sock\n"));
        assert!(text.contains("# generated: 2026-01-02T03:04:05Z\n"));
        assert!(text.contains("# command:   mysql-sandbox provision /tmp/x -s 'my db'\n"));
        assert!(text.contains("# cwd:       /home/dev\n"));
        assert_eq!(
            text.lines().last(),
            Some("exec /usr/local/bin/mysql-sandbox connect /tmp/x -- \"$@\"")
        );
    }

    #[test]
    fn newlines_cannot_escape_comments() {
        let mut s = script();
        s.provenance.cwd = PathBuf::from("/tmp/evil\nrm -rf /");
        let text = s.render();
        assert!(text.contains("# cwd:       /tmp/evil\\nrm -rf /\n"));
        assert!(!text.lines().any(|l| l.starts_with("rm")));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("/tmp/x"), "/tmp/x");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn header_warns_about_the_absolute_path() {
        let text = script().render();
        assert!(text.contains("edit it if the binary is moved or reinstalled"));
    }

    #[test]
    fn pristine_ignores_comments_but_not_commands() {
        let s = script();
        let rendered = s.render();
        assert!(is_pristine(&rendered, &s));

        let mut later = script();
        later.generated_at = Utc.with_ymd_and_hms(2027, 5, 6, 7, 8, 9).unwrap();
        later.provenance.cwd = PathBuf::from("/elsewhere");
        assert!(is_pristine(&rendered, &later));

        let commented = format!("{rendered}# note to self\n\n");
        assert!(is_pristine(&commented, &s));

        let edited = rendered.replace(" -- ", " -- --skip-column-names ");
        assert!(!is_pristine(&edited, &s));

        let mut moved = script();
        moved.executable = PathBuf::from("/opt/bin/mysql-sandbox");
        assert!(!is_pristine(&rendered, &moved));
    }

    #[test]
    fn run_script_pipes_input_and_maps_status() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wrapper.sh");
        let out = tmp.path().join("seen");
        fs::write(
            &path,
            format!("#!/bin/sh\n{{ echo \"$@\"; cat; }} > '{}'\nexit 4\n", out.display()),
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let exit = run_script(
            &path,
            vec!["--database=mydb".into()],
            ClientInput::Script("select 1;\n".into()),
        )
        .unwrap();

        assert_eq!(exit.code, 4);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "--database=mydb\nselect 1;\n"
        );
    }

    #[test]
    fn run_script_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run_script(&tmp.path().join("gone.sh"), vec![], ClientInput::Inherit)
            .unwrap_err();
        assert!(matches!(err, WrapperError::Exec { .. }));
    }

    #[test]
    fn write_once_is_executable_and_sticky() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mysql.sh");

        assert_eq!(write_once(&path, &script()).unwrap(), WriteOutcome::Written);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        fs::write(&path, "#!/bin/sh\n# customized\n").unwrap();
        assert_eq!(
            write_once(&path, &script()).unwrap(),
            WriteOutcome::AlreadyPresent
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#!/bin/sh\n# customized\n"
        );
    }
}
