//! Advisory lock serializing "check reachable, else start" across wrapper
//! invocations, so two racing sessions cannot both spawn a server.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::error::{WrapperError, WrapperResult};

/// An exclusive `flock(2)` on a lock file, released on drop.
#[derive(Debug)]
pub struct StartLock {
    file: File,
    path: PathBuf,
}

impl StartLock {
    /// Block until the lock at `path` is held. The file is created if needed.
    pub fn acquire(path: &Path) -> WrapperResult<Self> {
        let lock_err = |source: io::Error| WrapperError::Lock {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_err)?;
        flock(&file, libc::LOCK_EX).map_err(lock_err)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_acquire(path: &Path) -> WrapperResult<Option<Self>> {
        let lock_err = |source: io::Error| WrapperError::Lock {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_err)?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.raw_os_error() == Some(libc::EWOULDBLOCK) => Ok(None),
            Err(e) => Err(lock_err(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StartLock {
    fn drop(&mut self) {
        // Closing the descriptor would release it too; unlock explicitly anyway.
        let _ = flock(&self.file, libc::LOCK_UN);
    }
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    let fd = file.as_raw_fd();
    loop {
        // SAFETY: `fd` belongs to `file`, which is borrowed for the whole call.
        let res = unsafe { libc::flock(fd, operation) };
        if res == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
