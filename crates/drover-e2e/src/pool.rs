//! Runs the supervisor in-process against stub workers.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::net::TcpListener;
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::TempDir;
use thiserror::Error;

use crate::stub::{STOP_PATH, StubBehaviour};

const PORT_SEARCH_ATTEMPTS: usize = 64;

/// Timing flags keeping each supervisor run well under a few seconds.
const FAST_TIMINGS: &[&str] = &[
    "--sigterm-timeout-ms",
    "600",
    "--settle-delay-ms",
    "100",
    "--start-grace-ms",
    "150",
    "--start-poll-interval-ms",
    "100",
    "--start-timeout-ms",
    "5000",
    "--probe-timeout-ms",
    "500",
    "--log-filter",
    "warn",
];

/// Errors raised while preparing a pool.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Creating the pool directory or a file in it failed.
    #[error("pool directory error: {0}")]
    Io(#[from] io::Error),
    /// The temporary directory path is not UTF-8.
    #[error("temporary directory path is not valid UTF-8")]
    NonUtf8Path,
    /// No contiguous range of free loopback ports was found.
    #[error("no run of {0} free loopback ports found")]
    NoFreePorts(u16),
    /// The behaviour file could not be encoded.
    #[error("failed to encode worker behaviour: {0}")]
    Behaviour(#[from] serde_json::Error),
}

/// Captured result of one supervisor invocation.
#[derive(Debug)]
pub struct Outcome {
    /// Process exit status the binary would have returned.
    pub exit: ExitCode,
    /// Command summary written to stdout.
    pub stdout: String,
    /// Error messages written to stderr.
    pub stderr: String,
}

/// A pool of stub workers in a private temporary directory.
///
/// Any worker still named by a pidfile is killed when the harness drops.
pub struct PoolHarness {
    dir: TempDir,
    root: Utf8PathBuf,
    worker: Utf8PathBuf,
    base_port: u16,
    workers_count: u16,
    stop_path: bool,
}

impl PoolHarness {
    /// Prepares a pool of `workers_count` stub workers launched from
    /// `worker`, on a run of free loopback ports.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or no free
    /// port range is found.
    pub fn new(worker: &Utf8Path, workers_count: u16) -> Result<Self, HarnessError> {
        let dir = TempDir::new()?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|_| HarnessError::NonUtf8Path)?;
        let base_port = free_port_range(workers_count)?;
        let harness = Self {
            dir,
            root,
            worker: worker.to_owned(),
            base_port,
            workers_count,
            stop_path: false,
        };
        harness.set_behaviour(&StubBehaviour::default())?;
        Ok(harness)
    }

    /// Configures the cooperative stop endpoint for later runs.
    #[must_use]
    pub const fn with_stop_path(mut self) -> Self {
        self.stop_path = true;
        self
    }

    /// First port of the pool.
    #[must_use]
    pub const fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Ports of the configured pool.
    pub fn ports(&self) -> impl Iterator<Item = u16> + use<> {
        let base = self.base_port;
        (0..self.workers_count).map(move |offset| base + offset)
    }

    /// Rewrites the behaviour file read by workers launched from now on.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn set_behaviour(&self, behaviour: &StubBehaviour) -> Result<(), HarnessError> {
        let encoded = serde_json::to_string(behaviour)?;
        fs::write(self.behaviour_path(), encoded)?;
        Ok(())
    }

    /// Runs `drover` with the pool's configuration followed by `command`.
    #[must_use]
    pub fn run(&self, command: &[&str]) -> Outcome {
        self.run_as(self.workers_count, command)
    }

    /// Runs `drover` as though the pool had `workers_count` workers.
    #[must_use]
    pub fn run_as(&self, workers_count: u16, command: &[&str]) -> Outcome {
        let mut args: Vec<OsString> = vec!["drover".into()];
        let mut push = |flag: &str, value: String| {
            args.push(flag.into());
            args.push(value.into());
        };
        push("--port", self.base_port.to_string());
        push("--workers-count", workers_count.to_string());
        push("--pidfile-template", format!("{}/worker-%(port)s.pid", self.root));
        push("--logfile-template", format!("{}/worker-%(port)s.log", self.root));
        push("--worker-script", self.worker.to_string());
        push("--worker-config", self.behaviour_path().to_string());
        if self.stop_path {
            push("--stop-path", STOP_PATH.to_owned());
        }
        args.extend(FAST_TIMINGS.iter().map(OsString::from));
        args.extend(command.iter().map(OsString::from));

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit = drover::run(args, &mut stdout, &mut stderr);
        Outcome {
            exit,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }

    /// Pidfile path for `port`.
    #[must_use]
    pub fn pidfile(&self, port: u16) -> Utf8PathBuf {
        self.root.join(format!("worker-{port}.pid"))
    }

    /// Logfile path for `port`.
    #[must_use]
    pub fn logfile(&self, port: u16) -> Utf8PathBuf {
        self.root.join(format!("worker-{port}.log"))
    }

    /// Pid recorded for `port`, if any.
    #[must_use]
    pub fn pid(&self, port: u16) -> Option<i32> {
        read_pidfile(&self.pidfile(port))
    }

    fn behaviour_path(&self) -> Utf8PathBuf {
        self.root.join("worker.json")
    }
}

impl Drop for PoolHarness {
    fn drop(&mut self) {
        let Ok(entries) = fs::read_dir(self.dir.path()) else {
            return;
        };
        for entry in entries.flatten() {
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.extension() != Some("pid") {
                continue;
            }
            if let Some(pid) = read_pidfile(&path) {
                let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
            }
        }
    }
}

/// Whether `pid` names a process that has not exited.
#[must_use]
pub fn process_running(pid: i32) -> bool {
    if kill(Pid::from_raw(pid), None).is_err() {
        return false;
    }
    fs::read_to_string(format!("/proc/{pid}/stat")).map_or(true, |stat| {
        stat.rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_none_or(|state| state != "Z")
    })
}

fn read_pidfile(path: &Utf8Path) -> Option<i32> {
    fs::read_to_string(path)
        .ok()?
        .trim()
        .parse()
        .ok()
        .filter(|pid| *pid > 0)
}

/// Finds `count` consecutive ports that can all be bound on the loopback
/// interface.
fn free_port_range(count: u16) -> Result<u16, HarnessError> {
    for _ in 0..PORT_SEARCH_ATTEMPTS {
        let base = TcpListener::bind(("127.0.0.1", 0))?.local_addr()?.port();
        let Some(last) = base.checked_add(count.saturating_sub(1)) else {
            continue;
        };
        if (base..=last).all(|port| TcpListener::bind(("127.0.0.1", port)).is_ok()) {
            return Ok(base);
        }
    }
    Err(HarnessError::NoFreePorts(count))
}
