//! High-level orchestration of the `start`, `stop`, `restart`, and `status`
//! commands.
//!
//! Every verdict is recomputed from the pidfiles, the process table, and the
//! health endpoints on each invocation; nothing is cached between commands.

use std::collections::BTreeMap;
use std::io::Write;

use drover_config::{LaunchSettings, PoolSettings, StatusConvention};
use tracing::{debug, error, info, warn};

use super::pidfile::remove_pidfile;
use super::process::process_alive;
use super::shutdown::Terminator;
use super::slots::{WorkerSlot, configured_ports, pidfile_path, worker_slots};
use super::{
    CommandExit, HealthProbe, HttpProbe, LAUNCH_TARGET, LIFECYCLE_TARGET, LaunchHandle,
    LaunchRequest, LifecycleCommand, LifecycleError, LifecycleOutput, Pause, ProcessTable,
    SystemLauncher, SystemProcessTable, ThreadPause, WorkerLauncher, find_stale_ports,
};
use crate::cli::Expectation;

/// Lifecycle engine for one pool, generic over its OS and network seams.
pub struct Supervisor<'a, P, H, L, S> {
    settings: &'a PoolSettings,
    processes: P,
    probe: H,
    launcher: L,
    pause: S,
}

impl<'a, P, H, L, S> Supervisor<'a, P, H, L, S>
where
    P: ProcessTable,
    H: HealthProbe,
    L: WorkerLauncher,
    S: Pause,
{
    pub const fn new(
        settings: &'a PoolSettings,
        processes: P,
        probe: H,
        launcher: L,
        pause: S,
    ) -> Self {
        Self {
            settings,
            processes,
            probe,
            launcher,
            pause,
        }
    }

    /// Runs `command` and returns its exit verdict.
    ///
    /// # Errors
    ///
    /// Returns an error when launch settings are missing for `start` or
    /// `restart`, or when writing the summary fails. Worker-level failures
    /// are reported through the verdict instead.
    pub fn handle<W: Write>(
        &self,
        command: LifecycleCommand,
        output: &mut LifecycleOutput<W>,
    ) -> Result<CommandExit, LifecycleError> {
        match command {
            LifecycleCommand::Start => self.start(output),
            LifecycleCommand::Stop => self.stop(output),
            LifecycleCommand::Restart => self.restart(output),
            LifecycleCommand::Status { expect } => self.status(expect, output),
        }
    }

    /// Whether the pidfile for `port` names a live process.
    pub fn process_alive(&self, port: u16) -> bool {
        process_alive(&self.processes, &pidfile_path(self.settings, port))
    }

    /// Whether the worker on `port` answers its health endpoint.
    pub fn service_alive(&self, port: u16) -> bool {
        self.probe.service_alive(port)
    }

    /// Ports of pidfiles matching the template outside the configured pool.
    pub fn stale_ports(&self) -> Vec<u16> {
        find_stale_ports(
            self.settings.pidfile_template(),
            &configured_ports(self.settings),
        )
    }

    /// Launches every free slot and waits for the pool to settle.
    ///
    /// Succeeds only when every configured worker answers its health probe.
    pub fn start<W: Write>(
        &self,
        output: &mut LifecycleOutput<W>,
    ) -> Result<CommandExit, LifecycleError> {
        let launch = self.settings.launch()?;
        let mut handles = self.launch_all(&launch);
        self.await_settled(&mut handles);
        drop(handles);
        self.discard_dead_pidfiles();
        self.status(Some(Expectation::Started), output)
    }

    /// Terminates configured and stale workers.
    ///
    /// Succeeds only when every targeted process is gone and no configured
    /// worker still answers its health probe.
    pub fn stop<W: Write>(
        &self,
        output: &mut LifecycleOutput<W>,
    ) -> Result<CommandExit, LifecycleError> {
        let mut ports = configured_ports(self.settings);
        let stale = self.stale_ports();
        if !stale.is_empty() {
            info!(target: LIFECYCLE_TARGET, ?stale, "stopping stale workers as well");
        }
        ports.extend(stale);

        let terminated = Terminator {
            settings: self.settings,
            processes: &self.processes,
            probe: &self.probe,
            pause: &self.pause,
        }
        .terminate(&ports);
        let status = self.status(Some(Expectation::Stopped), output)?;
        Ok(CommandExit::from_bool(terminated).and(status))
    }

    /// Stops then starts the pool; `start` runs even when `stop` fails.
    pub fn restart<W: Write>(
        &self,
        output: &mut LifecycleOutput<W>,
    ) -> Result<CommandExit, LifecycleError> {
        // Refuse to take the pool down when it could not be brought back.
        self.settings.launch()?;
        let stopped = self.stop(output)?;
        if !stopped.is_success() {
            warn!(
                target: LIFECYCLE_TARGET,
                "stop did not complete cleanly; starting workers anyway"
            );
        }
        let started = self.start(output)?;
        Ok(stopped.and(started))
    }

    /// Reports how many configured workers answer their health probe.
    pub fn status<W: Write>(
        &self,
        expect: Option<Expectation>,
        output: &mut LifecycleOutput<W>,
    ) -> Result<CommandExit, LifecycleError> {
        let stale_running: Vec<u16> = self
            .stale_ports()
            .into_iter()
            .filter(|port| self.service_alive(*port))
            .collect();
        if !stale_running.is_empty() {
            warn!(target: LIFECYCLE_TARGET, ports = ?stale_running, "some stale workers are running");
        }

        let ports = configured_ports(self.settings);
        let running: Vec<u16> = ports
            .iter()
            .copied()
            .filter(|port| self.service_alive(*port))
            .collect();
        let total = ports.len();

        if running.len() == total {
            if expect == Some(Expectation::Stopped) {
                error!(target: LIFECYCLE_TARGET, "all workers are running");
            } else {
                info!(target: LIFECYCLE_TARGET, "all workers are running");
            }
            output.stdout_line(format_args!("all {total} workers are running"))?;
        } else if running.is_empty() {
            if expect == Some(Expectation::Started) {
                error!(target: LIFECYCLE_TARGET, "all workers are stopped");
            } else {
                info!(target: LIFECYCLE_TARGET, "all workers are stopped");
            }
            output.stdout_line(format_args!("all {total} workers are stopped"))?;
        } else {
            warn!(target: LIFECYCLE_TARGET, ?running, "some workers are running");
            output.stdout_line(format_args!(
                "{} of {total} workers are running (ports {})",
                running.len(),
                join_ports(&running)
            ))?;
        }

        Ok(status_verdict(
            running.len(),
            total,
            expect,
            self.settings.status_convention(),
        ))
    }

    fn launch_all(&self, launch: &LaunchSettings) -> BTreeMap<u16, L::Handle> {
        let mut handles = BTreeMap::new();
        for WorkerSlot { index, port } in worker_slots(self.settings) {
            if self.process_alive(port) {
                warn!(
                    target: LAUNCH_TARGET,
                    index,
                    port,
                    "another process already started on this port"
                );
                continue;
            }
            let request = LaunchRequest::for_port(self.settings, launch, port);
            match self.launcher.launch(&request) {
                Ok(handle) => {
                    debug!(target: LAUNCH_TARGET, index, port, "worker launched");
                    handles.insert(port, handle);
                }
                Err(error) => {
                    error!(target: LAUNCH_TARGET, index, port, error = %error, "launch failed");
                }
            }
        }
        handles
    }

    fn await_settled(&self, handles: &mut BTreeMap<u16, L::Handle>) {
        let timings = self.settings.timings();
        self.pause.pause(timings.start_grace);

        let started = self.pause.now();
        let expired =
            || self.pause.now().saturating_duration_since(started) >= timings.start_timeout;
        let mut pending = configured_ports(self.settings);
        loop {
            pending.retain(|port| expired() || !self.slot_settled(*port, handles.get_mut(port)));
            if pending.is_empty() {
                return;
            }
            if expired() {
                warn!(
                    target: LIFECYCLE_TARGET,
                    ?pending,
                    timeout_ms = timings.start_timeout.as_millis(),
                    "gave up waiting for workers to start"
                );
                return;
            }
            info!(target: LIFECYCLE_TARGET, ?pending, "waiting for workers to start");
            self.pause.pause(timings.start_poll_interval);
        }
    }

    /// A slot settles once its launch command exited and the process and
    /// health verdicts agree.
    fn slot_settled(&self, port: u16, handle: Option<&mut L::Handle>) -> bool {
        if !handle.is_none_or(|handle| handle.has_exited()) {
            return false;
        }
        match (self.process_alive(port), self.service_alive(port)) {
            (true, true) => {
                info!(target: LIFECYCLE_TARGET, port, "worker started");
                true
            }
            (false, false) => {
                error!(target: LIFECYCLE_TARGET, port, "worker failed to start");
                true
            }
            _ => false,
        }
    }

    fn discard_dead_pidfiles(&self) {
        for port in configured_ports(self.settings) {
            if !self.process_alive(port) {
                remove_pidfile(&pidfile_path(self.settings, port));
            }
        }
    }
}

/// Exit code for `running` healthy workers out of `total`.
pub(crate) const fn status_verdict(
    running: usize,
    total: usize,
    expect: Option<Expectation>,
    convention: StatusConvention,
) -> CommandExit {
    if running == total {
        match expect {
            Some(Expectation::Stopped) => CommandExit::FAILURE,
            _ => CommandExit::SUCCESS,
        }
    } else if running > 0 {
        CommandExit::FAILURE
    } else {
        match expect {
            Some(Expectation::Started) => CommandExit::FAILURE,
            Some(Expectation::Stopped) => CommandExit::SUCCESS,
            None => CommandExit::new(convention.stopped_exit_code()),
        }
    }
}

fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Production lifecycle controller wiring the system seams together.
#[derive(Debug, Default)]
pub struct SystemLifecycle;

impl SystemLifecycle {
    pub fn handle<W: Write>(
        &mut self,
        command: LifecycleCommand,
        settings: &PoolSettings,
        output: &mut LifecycleOutput<W>,
    ) -> Result<CommandExit, LifecycleError> {
        let probe = HttpProbe::new(settings.probe())?;
        Supervisor::new(
            settings,
            SystemProcessTable,
            probe,
            SystemLauncher,
            ThreadPause,
        )
        .handle(command, output)
    }
}
