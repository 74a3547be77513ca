//! Write-once file publication.
//!
//! Contents go to a temporary file next to the target, which is then linked
//! into place only if the target does not exist yet. A run interrupted half
//! way leaves at most a stray temporary file, never a partial target, so the
//! target's existence stays a reliable marker.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Result of [`publish_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyPresent,
}

/// Publish `contents` at `path` with `mode`, unless something is already there.
pub fn publish_new(path: &Path, contents: &[u8], mode: u32) -> io::Result<WriteOutcome> {
    if path.exists() {
        return Ok(WriteOutcome::AlreadyPresent);
    }
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let prefix = format!(
        ".{}.",
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(WriteOutcome::Written),
        // The temporary file is removed when the error's handle drops.
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(WriteOutcome::AlreadyPresent)
        }
        Err(e) => Err(e.error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_with_mode_and_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mysql.sh");

        let outcome = publish_new(&path, b"#!/bin/sh\n", 0o755).unwrap();

        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read(&path).unwrap(), b"#!/bin/sh\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(entries(tmp.path()), vec!["mysql.sh".to_string()]);
    }

    #[test]
    fn existing_target_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mysql.cnf");
        fs::write(&path, "edited by hand\n").unwrap();

        let outcome = publish_new(&path, b"[mysqld]\n", 0o644).unwrap();

        assert_eq!(outcome, WriteOutcome::AlreadyPresent);
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited by hand\n");
        assert_eq!(entries(tmp.path()), vec!["mysql.cnf".to_string()]);
    }

    #[test]
    fn stray_temp_file_does_not_block_publishing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mysql.cnf");
        fs::write(tmp.path().join(".mysql.cnf.Ab12Cd.tmp"), "[mysq").unwrap();

        let outcome = publish_new(&path, b"[mysqld]\n", 0o644).unwrap();

        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[mysqld]\n");
    }
}
