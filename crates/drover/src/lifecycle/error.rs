//! Error types for worker-pool lifecycle operations.

use std::io;

use camino::Utf8PathBuf;
use drover_config::PoolSettingsError;
use thiserror::Error;

use super::StopSignal;

/// Errors raised while executing lifecycle commands.
///
/// Only [`LifecycleError::Settings`], [`LifecycleError::ProbeClient`], and
/// [`LifecycleError::Io`] abort a command. Launch and signal failures are
/// logged per worker and fold into the command's exit verdict.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Settings(#[from] PoolSettingsError),
    #[error("failed to build HTTP probe client: {0}")]
    ProbeClient(#[source] reqwest::Error),
    #[error("failed to launch worker '{program}' for port {port}: {source}")]
    LaunchWorker {
        program: Utf8PathBuf,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("pid {pid} does not fit the platform pid range")]
    InvalidPid { pid: u32 },
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        pid: u32,
        signal: StopSignal,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
}
