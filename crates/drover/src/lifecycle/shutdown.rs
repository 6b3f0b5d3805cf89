//! Worker termination: graceful signal, wait, forceful signal, reconcile.

use std::time::Duration;

use drover_config::PoolSettings;
use tracing::{debug, info, warn};

use super::pidfile::remove_pidfile;
use super::process::process_alive;
use super::slots::pidfile_path;
use super::{HealthProbe, Pause, ProcessTable, StopSignal, TERMINATE_TARGET, read_pid};

/// Stops a batch of workers addressed by port.
pub(crate) struct Terminator<'a, P, H, S> {
    pub(crate) settings: &'a PoolSettings,
    pub(crate) processes: &'a P,
    pub(crate) probe: &'a H,
    pub(crate) pause: &'a S,
}

impl<P, H, S> Terminator<'_, P, H, S>
where
    P: ProcessTable,
    H: HealthProbe,
    S: Pause,
{
    /// Terminates every worker in `ports`; returns `true` when none survive.
    ///
    /// The graceful window is waited once for the whole batch. Pidfiles are
    /// removed only for processes confirmed gone.
    pub(crate) fn terminate(&self, ports: &[u16]) -> bool {
        if ports.iter().any(|port| self.probe.service_alive(*port)) {
            warn!(
                target: TERMINATE_TARGET,
                "some workers are running; stopping them"
            );
        }

        for port in ports {
            self.probe.request_stop(*port);
            self.signal(*port, StopSignal::Graceful);
        }
        self.pause.pause(self.settings.timings().sigterm_timeout);

        for port in ports {
            if self.alive(*port) {
                warn!(
                    target: TERMINATE_TARGET,
                    port,
                    "worker ignored SIGTERM; escalating to SIGKILL"
                );
                self.signal(*port, StopSignal::Forceful);
            } else {
                remove_pidfile(&pidfile_path(self.settings, *port));
            }
        }
        self.pause.pause(self.settle_window());

        let survivors: Vec<u16> = ports
            .iter()
            .copied()
            .filter(|port| {
                if self.alive(*port) {
                    warn!(target: TERMINATE_TARGET, port, "failed to stop worker");
                    true
                } else {
                    remove_pidfile(&pidfile_path(self.settings, *port));
                    false
                }
            })
            .collect();

        if survivors.is_empty() {
            info!(target: TERMINATE_TARGET, workers = ports.len(), "workers stopped");
            true
        } else {
            warn!(target: TERMINATE_TARGET, ?survivors, "failed to stop workers");
            false
        }
    }

    fn signal(&self, port: u16, signal: StopSignal) {
        let path = pidfile_path(self.settings, port);
        if !path.exists() {
            warn!(
                target: TERMINATE_TARGET,
                port,
                file = %path,
                "pidfile does not exist; nothing to signal"
            );
            return;
        }
        let Some(pid) = read_pid(&path) else {
            return;
        };
        match self.processes.send(pid, signal) {
            Ok(()) => debug!(target: TERMINATE_TARGET, port, pid, %signal, "signal delivered"),
            Err(error) => debug!(target: TERMINATE_TARGET, port, pid, error = %error, "signal not delivered"),
        }
    }

    fn alive(&self, port: u16) -> bool {
        process_alive(self.processes, &pidfile_path(self.settings, port))
    }

    fn settle_window(&self) -> Duration {
        self.settings
            .timings()
            .settle_delay
            .saturating_mul(u32::from(self.settings.workers_count()))
    }
}
