//! Worker process launching.

use std::process::{Child, Command, Stdio};

use camino::Utf8PathBuf;
use drover_config::{LaunchSettings, PoolSettings};
use tracing::{info, warn};

use super::slots::{logfile_path, pidfile_path};
use super::{LAUNCH_TARGET, LifecycleError};

/// Fully resolved command line for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub port: u16,
    pub program: Utf8PathBuf,
    pub pidfile: Utf8PathBuf,
    pub args: Vec<String>,
}

impl LaunchRequest {
    /// Builds `<script> --config=<cfg> --port=<port> --pidfile=<path>
    /// [--logfile=<path>]` for `port`.
    #[must_use]
    pub fn for_port(settings: &PoolSettings, launch: &LaunchSettings, port: u16) -> Self {
        let pidfile = pidfile_path(settings, port);
        let mut args = vec![
            format!("--config={}", launch.config),
            format!("--port={port}"),
            format!("--pidfile={pidfile}"),
        ];
        if let Some(logfile) = logfile_path(settings, port) {
            args.push(format!("--logfile={logfile}"));
        }
        Self {
            port,
            program: launch.script.clone(),
            pidfile,
            args,
        }
    }
}

/// Spawns worker processes.
pub trait WorkerLauncher {
    type Handle: LaunchHandle;

    /// Starts the worker described by `request` without waiting for readiness.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::LaunchWorker`] if the process cannot be
    /// spawned.
    fn launch(&self, request: &LaunchRequest) -> Result<Self::Handle, LifecycleError>;
}

/// Handle to a launched worker command.
///
/// Workers that daemonise exit their launch command once detached, so an
/// exited handle says nothing about the worker itself.
pub trait LaunchHandle {
    fn has_exited(&mut self) -> bool;
}

/// Launches workers with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

/// Spawned launch command.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
}

impl WorkerLauncher for SystemLauncher {
    type Handle = ChildHandle;

    fn launch(&self, request: &LaunchRequest) -> Result<ChildHandle, LifecycleError> {
        let child = Command::new(request.program.as_std_path())
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| LifecycleError::LaunchWorker {
                program: request.program.clone(),
                port: request.port,
                source,
            })?;
        info!(
            target: LAUNCH_TARGET,
            port = request.port,
            pid = child.id(),
            program = %request.program,
            "launched worker"
        );
        Ok(ChildHandle { child })
    }
}

impl LaunchHandle for ChildHandle {
    fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    warn!(
                        target: LAUNCH_TARGET,
                        pid = self.child.id(),
                        %status,
                        "worker launch command exited unsuccessfully"
                    );
                }
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!(
                    target: LAUNCH_TARGET,
                    pid = self.child.id(),
                    error = %error,
                    "cannot poll worker launch command; treating it as exited"
                );
                true
            }
        }
    }
}
