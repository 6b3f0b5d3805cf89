//! Scripted worker pool used by lifecycle unit and behaviour tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::rc::Rc;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use drover_config::{Config, PoolSettings};
use nix::errno::Errno;
use tempfile::TempDir;

use crate::lifecycle::{
    HealthProbe, LaunchHandle, LaunchRequest, LifecycleError, Pause, ProcessTable, StopSignal,
    Supervisor, WorkerLauncher, pidfile_path,
};

/// How a scripted worker reacts to being launched and signalled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum WorkerBehaviour {
    /// Binds, writes its pidfile, and exits cleanly on SIGTERM.
    #[default]
    Healthy,
    /// Exits before binding; no pidfile is written.
    FailsToBind,
    /// Runs but never answers its health endpoint.
    Hangs,
    /// Keeps running after SIGTERM; dies on SIGKILL.
    IgnoresSigterm,
    /// Survives both signals.
    Unkillable,
}

#[derive(Debug, Clone)]
struct FakeWorker {
    port: u16,
    pidfile: Utf8PathBuf,
    alive: bool,
    healthy: bool,
    behaviour: WorkerBehaviour,
}

#[derive(Debug, Default)]
struct PoolState {
    workers: BTreeMap<u32, FakeWorker>,
    next_pid: u32,
    behaviours: HashMap<u16, WorkerBehaviour>,
    launch_polls: u32,
    launches: Vec<LaunchRequest>,
    signals: Vec<(u32, StopSignal)>,
    stop_requests: Vec<u16>,
    pauses: Vec<Duration>,
    clock: Duration,
    health_check_cost: Duration,
}

impl PoolState {
    fn spawn(&mut self, port: u16, pidfile: &Utf8Path, behaviour: WorkerBehaviour) -> u32 {
        self.next_pid += 1;
        let pid = 4000 + self.next_pid;
        fs::write(pidfile, format!("{pid}\n")).expect("write fake pidfile");
        self.workers.insert(
            pid,
            FakeWorker {
                port,
                pidfile: pidfile.to_owned(),
                alive: true,
                healthy: behaviour != WorkerBehaviour::Hangs,
                behaviour,
            },
        );
        pid
    }
}

type Shared = Rc<RefCell<PoolState>>;

/// Process table view over the scripted workers.
#[derive(Clone)]
pub(crate) struct FakeProcesses(Shared);

/// Health probe answering for live, healthy scripted workers.
#[derive(Clone)]
pub(crate) struct FakeProbe(Shared);

/// Launcher that turns launch requests into scripted workers.
#[derive(Clone)]
pub(crate) struct FakeLauncher(Shared);

/// Pause that records durations and advances a virtual clock instead of
/// sleeping.
#[derive(Clone)]
pub(crate) struct RecordingPause {
    state: Shared,
    origin: Instant,
}

/// Launch command that exits after a scripted number of polls.
pub(crate) struct FakeHandle {
    remaining_polls: u32,
}

impl ProcessTable for FakeProcesses {
    fn is_running(&self, pid: u32) -> bool {
        self.0
            .borrow()
            .workers
            .get(&pid)
            .is_some_and(|worker| worker.alive)
    }

    fn send(&self, pid: u32, signal: StopSignal) -> Result<(), LifecycleError> {
        let mut state = self.0.borrow_mut();
        state.signals.push((pid, signal));
        let Some(worker) = state.workers.get_mut(&pid).filter(|worker| worker.alive) else {
            return Err(LifecycleError::Signal {
                pid,
                signal,
                source: Errno::ESRCH,
            });
        };
        match (signal, worker.behaviour) {
            (_, WorkerBehaviour::Unkillable) | (StopSignal::Graceful, WorkerBehaviour::IgnoresSigterm) => {}
            (StopSignal::Graceful, _) => {
                worker.alive = false;
                worker.healthy = false;
                let _ = fs::remove_file(&worker.pidfile);
            }
            (StopSignal::Forceful, _) => {
                worker.alive = false;
                worker.healthy = false;
            }
        }
        Ok(())
    }
}

impl HealthProbe for FakeProbe {
    fn service_alive(&self, port: u16) -> bool {
        let mut state = self.0.borrow_mut();
        let cost = state.health_check_cost;
        state.clock += cost;
        state
            .workers
            .values()
            .any(|worker| worker.port == port && worker.alive && worker.healthy)
    }

    fn request_stop(&self, port: u16) {
        self.0.borrow_mut().stop_requests.push(port);
    }
}

impl WorkerLauncher for FakeLauncher {
    type Handle = FakeHandle;

    fn launch(&self, request: &LaunchRequest) -> Result<FakeHandle, LifecycleError> {
        let mut state = self.0.borrow_mut();
        state.launches.push(request.clone());
        if request.program.as_str().starts_with("/nonexistent") {
            return Err(LifecycleError::LaunchWorker {
                program: request.program.clone(),
                port: request.port,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let behaviour = state
            .behaviours
            .get(&request.port)
            .copied()
            .unwrap_or_default();
        if behaviour != WorkerBehaviour::FailsToBind {
            state.spawn(request.port, &request.pidfile, behaviour);
        }
        Ok(FakeHandle {
            remaining_polls: state.launch_polls,
        })
    }
}

impl LaunchHandle for FakeHandle {
    fn has_exited(&mut self) -> bool {
        if self.remaining_polls == 0 {
            return true;
        }
        self.remaining_polls -= 1;
        false
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        let mut state = self.state.borrow_mut();
        state.pauses.push(duration);
        state.clock += duration;
    }

    fn now(&self) -> Instant {
        self.origin + self.state.borrow().clock
    }
}

/// Supervisor type driven entirely by the fake pool.
pub(crate) type FakeSupervisor<'a> =
    Supervisor<'a, FakeProcesses, FakeProbe, FakeLauncher, RecordingPause>;

/// A temporary pidfile directory plus scripted workers.
pub(crate) struct FakePool {
    _dir: TempDir,
    config: Config,
    settings: PoolSettings,
    state: Shared,
    origin: Instant,
}

impl FakePool {
    /// Pool of `workers_count` workers from `base_port` with pidfiles in a
    /// fresh temporary directory.
    pub(crate) fn new(base_port: u16, workers_count: u16) -> Self {
        Self::with_config(base_port, workers_count, |_| {})
    }

    pub(crate) fn with_config(
        base_port: u16,
        workers_count: u16,
        customise: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mut config = Self::config_for(&dir, base_port, workers_count);
        customise(&mut config);
        let settings = PoolSettings::from_config(&config).expect("valid settings");
        Self {
            _dir: dir,
            config,
            settings,
            state: Rc::default(),
            origin: Instant::now(),
        }
    }

    fn config_for(dir: &TempDir, base_port: u16, workers_count: u16) -> Config {
        Config {
            port: base_port,
            workers_count,
            pidfile_template: Some(format!("{}/worker-%(port)s.pid", dir.path().display())),
            worker_script: Some(Utf8PathBuf::from("/srv/app/worker")),
            worker_config: Some(Utf8PathBuf::from("/srv/app/worker.cfg")),
            ..Config::default()
        }
    }

    /// Raw configuration equivalent to this pool's settings.
    pub(crate) fn config(&self) -> Config {
        self.config.clone()
    }

    pub(crate) const fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub(crate) fn supervisor(&self) -> FakeSupervisor<'_> {
        Supervisor::new(
            &self.settings,
            self.processes(),
            self.probe(),
            FakeLauncher(Rc::clone(&self.state)),
            self.pause(),
        )
    }

    pub(crate) fn processes(&self) -> FakeProcesses {
        FakeProcesses(Rc::clone(&self.state))
    }

    pub(crate) fn probe(&self) -> FakeProbe {
        FakeProbe(Rc::clone(&self.state))
    }

    pub(crate) fn pause(&self) -> RecordingPause {
        RecordingPause {
            state: Rc::clone(&self.state),
            origin: self.origin,
        }
    }

    /// Scripts how the worker for `port` behaves when launched or adopted.
    pub(crate) fn behave(&self, port: u16, behaviour: WorkerBehaviour) {
        self.state.borrow_mut().behaviours.insert(port, behaviour);
    }

    /// Makes every launch command stay alive for `polls` readiness polls.
    pub(crate) fn delay_launch_exit(&self, polls: u32) {
        self.state.borrow_mut().launch_polls = polls;
    }

    /// Makes every health check advance the clock by `cost`.
    pub(crate) fn slow_health_checks(&self, cost: Duration) {
        self.state.borrow_mut().health_check_cost = cost;
    }

    /// Starts a worker on `port` outside the supervisor and returns its pid.
    pub(crate) fn adopt_running(&self, port: u16) -> u32 {
        let pidfile = self.pidfile(port);
        let mut state = self.state.borrow_mut();
        let behaviour = state.behaviours.get(&port).copied().unwrap_or_default();
        state.spawn(port, &pidfile, behaviour)
    }

    /// Kills the worker on `port` without cleaning up its pidfile.
    pub(crate) fn kill_out_of_band(&self, port: u16) {
        for worker in self.state.borrow_mut().workers.values_mut() {
            if worker.port == port {
                worker.alive = false;
                worker.healthy = false;
            }
        }
    }

    /// Writes a pidfile for `port` naming a pid that is not running.
    pub(crate) fn write_orphan_pidfile(&self, port: u16) {
        fs::write(self.pidfile(port), "999999\n").expect("write orphan pidfile");
    }

    pub(crate) fn pidfile(&self, port: u16) -> Utf8PathBuf {
        pidfile_path(&self.settings, port)
    }

    pub(crate) fn pidfile_exists(&self, port: u16) -> bool {
        self.pidfile(port).exists()
    }

    pub(crate) fn live_workers_on(&self, port: u16) -> usize {
        self.state
            .borrow()
            .workers
            .values()
            .filter(|worker| worker.port == port && worker.alive)
            .count()
    }

    pub(crate) fn launched_ports(&self) -> Vec<u16> {
        self.state
            .borrow()
            .launches
            .iter()
            .map(|request| request.port)
            .collect()
    }

    pub(crate) fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.state.borrow().signals.clone()
    }

    pub(crate) fn stop_requests(&self) -> Vec<u16> {
        self.state.borrow().stop_requests.clone()
    }

    pub(crate) fn pauses(&self) -> Vec<Duration> {
        self.state.borrow().pauses.clone()
    }

    /// Virtual time spent pausing and checking health so far.
    pub(crate) fn elapsed(&self) -> Duration {
        self.state.borrow().clock
    }
}
