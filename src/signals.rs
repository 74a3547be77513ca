//! Signal handling while a client session runs.
//!
//! A terminal Ctrl-C reaches the whole foreground process group: the client
//! and this process alike. The client decides what an interrupt means, so
//! while a [`SignalGuard`] is alive this process survives SIGINT and SIGQUIT
//! and stays around to stop the server it started. SIGTERM and SIGHUP are
//! recorded and forwarded to the registered child (see [`forward_to`]); once
//! the child exits the session winds down normally.
//!
//! Handlers, unlike ignored dispositions, are reset to the default in exec'd
//! children, so clients start with ordinary signal behavior.

use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

const HANDLED: [libc::c_int; 4] = [libc::SIGINT, libc::SIGQUIT, libc::SIGTERM, libc::SIGHUP];

/// Child that terminating signals are forwarded to, 0 for none.
static CHILD_PID: AtomicI32 = AtomicI32::new(0);
/// Last terminating signal received while guarded, 0 for none.
static PENDING: AtomicI32 = AtomicI32::new(0);

struct Installed {
    guards: usize,
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

static INSTALLED: Mutex<Option<Installed>> = Mutex::new(None);

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

extern "C" fn on_signal(signal: libc::c_int) {
    if signal != libc::SIGTERM && signal != libc::SIGHUP {
        return;
    }
    // SAFETY: only async-signal-safe work below; errno is restored for the
    // interrupted code.
    unsafe {
        let errno = *errno_location();
        PENDING.store(signal, Ordering::SeqCst);
        let pid = CHILD_PID.load(Ordering::SeqCst);
        if pid > 0 {
            libc::kill(pid, signal);
        }
        *errno_location() = errno;
    }
}

fn install(signal: libc::c_int) -> io::Result<libc::sigaction> {
    // SAFETY: both structs are fully initialized before use and the handler
    // only touches atomics and kill(2).
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        let mut previous: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(signal, &action, &mut previous) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(previous)
    }
}

fn restore(previous: &[(libc::c_int, libc::sigaction)]) {
    for (signal, action) in previous {
        // SAFETY: `action` was returned by sigaction(2) for this signal.
        unsafe {
            libc::sigaction(*signal, action, std::ptr::null_mut());
        }
    }
}

/// Keeps the session handlers installed while alive. Guards nest; the
/// previous dispositions come back when the last one drops.
#[derive(Debug)]
pub struct SignalGuard {
    _private: (),
}

impl SignalGuard {
    pub fn install() -> io::Result<Self> {
        let mut installed = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
        match installed.as_mut() {
            Some(state) => state.guards += 1,
            None => {
                PENDING.store(0, Ordering::SeqCst);
                let mut previous = Vec::with_capacity(HANDLED.len());
                for signal in HANDLED {
                    match install(signal) {
                        Ok(action) => previous.push((signal, action)),
                        Err(e) => {
                            restore(&previous);
                            return Err(e);
                        }
                    }
                }
                *installed = Some(Installed {
                    guards: 1,
                    previous,
                });
            }
        }
        Ok(Self { _private: () })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        let mut installed = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = installed.as_mut() {
            state.guards -= 1;
            if state.guards == 0 {
                restore(&state.previous);
                *installed = None;
            }
        }
    }
}

/// Terminating signal received since the guards were installed, if any.
pub fn pending_termination() -> Option<i32> {
    match PENDING.load(Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}

/// Registration of the child that terminating signals go to.
#[derive(Debug)]
pub struct ForwardTarget {
    pid: i32,
}

/// Forward SIGTERM/SIGHUP to `pid` until the returned value drops. A signal
/// that arrived before registration is delivered right away.
pub fn forward_to(pid: u32) -> ForwardTarget {
    let pid = i32::try_from(pid).unwrap_or(0);
    CHILD_PID.store(pid, Ordering::SeqCst);
    if let Some(signal) = pending_termination() {
        if pid > 0 {
            // SAFETY: kill(2) on a child we spawned and have not reaped.
            unsafe {
                libc::kill(pid, signal);
            }
        }
    }
    ForwardTarget { pid }
}

impl Drop for ForwardTarget {
    fn drop(&mut self) {
        let _ = CHILD_PID.compare_exchange(self.pid, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}
