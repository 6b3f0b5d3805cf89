//! Worker-pool lifecycle engine.
//!
//! Submodules, leaves first:
//! - [`slots`] derives ports and pidfile/logfile paths per worker.
//! - [`pidfile`] reads and reconciles worker pidfiles.
//! - [`process`] checks OS-level liveness and delivers stop signals.
//! - [`probe`] performs HTTP health and stop requests.
//! - [`stale`] discovers pidfiles left by workers outside the pool.
//! - [`spawning`] launches worker processes.
//! - [`shutdown`] escalates from SIGTERM to SIGKILL and cleans up.
//! - [`controller`] turns the pieces into `start`, `stop`, `restart`, and
//!   `status`.

mod controller;
mod error;
mod pause;
mod pidfile;
mod probe;
mod process;
mod shutdown;
mod slots;
mod spawning;
mod stale;
mod types;

pub(crate) use controller::SystemLifecycle;
#[cfg(test)]
pub(crate) use controller::Supervisor;
pub(crate) use error::LifecycleError;
pub(crate) use pause::{Pause, ThreadPause};
pub(crate) use probe::{HealthProbe, HttpProbe};
pub(crate) use process::{ProcessTable, StopSignal, SystemProcessTable};
#[cfg(test)]
pub(crate) use slots::{pidfile_path, worker_slots};
pub(crate) use spawning::{LaunchHandle, LaunchRequest, SystemLauncher, WorkerLauncher};
pub(crate) use stale::find_stale_ports;
pub(crate) use types::{CommandExit, LifecycleCommand, LifecycleOutput};
pub(crate) use pidfile::read_pid;

pub(crate) const PROBE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::probe");
pub(crate) const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");
pub(crate) const TERMINATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::terminate");
pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");
