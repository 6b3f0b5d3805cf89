//! OS-level process liveness and signal delivery.

use std::fmt;

use camino::Utf8Path;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use super::{LifecycleError, read_pid};

/// Signals used to stop workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM: ask the worker to finish in-flight work and exit.
    Graceful,
    /// SIGKILL: terminate without cooperation.
    Forceful,
}

impl StopSignal {
    const fn as_nix(self) -> Signal {
        match self {
            Self::Graceful => Signal::SIGTERM,
            Self::Forceful => Signal::SIGKILL,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_nix().as_str())
    }
}

/// View of the operating system process table.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessTable {
    /// Whether `pid` names a live, non-zombie process.
    fn is_running(&self, pid: u32) -> bool;

    /// Delivers `signal` to `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Signal`] when the kernel rejects the signal,
    /// or [`LifecycleError::InvalidPid`] for pids outside the platform range.
    fn send(&self, pid: u32, signal: StopSignal) -> Result<(), LifecycleError>;
}

/// Process table backed by `kill(2)` and, on Linux, `/proc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn is_running(&self, pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        match kill(Pid::from_raw(raw), None) {
            // EPERM still proves the pid exists; it just belongs to another user.
            Ok(()) | Err(Errno::EPERM) => !is_zombie(pid),
            Err(_) => false,
        }
    }

    fn send(&self, pid: u32, signal: StopSignal) -> Result<(), LifecycleError> {
        let raw = i32::try_from(pid).map_err(|_| LifecycleError::InvalidPid { pid })?;
        kill(Pid::from_raw(raw), signal.as_nix()).map_err(|source| LifecycleError::Signal {
            pid,
            signal,
            source,
        })
    }
}

/// Reads the pidfile at `pidfile` and checks the recorded process.
///
/// A missing or malformed pidfile means the worker is not alive. A reused pid
/// is indistinguishable from the original worker.
pub(crate) fn process_alive<P: ProcessTable + ?Sized>(processes: &P, pidfile: &Utf8Path) -> bool {
    read_pid(pidfile).is_some_and(|pid| processes.is_running(pid))
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // Field 3 of /proc/<pid>/stat is the state; the command name before it may
    // contain spaces and parentheses, so split after the last ')'.
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next().map(|state| state == "Z"))
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
const fn is_zombie(_pid: u32) -> bool {
    false
}
