//! Supervisor command semantics against the scripted pool.

use std::time::Duration;

use drover_config::{PoolSettingsError, StatusConvention};
use rstest::{fixture, rstest};

use crate::Expectation;
use crate::lifecycle::{CommandExit, LifecycleError, LifecycleOutput, StopSignal};
use crate::tests::support::{FakePool, WorkerBehaviour};

type Output = LifecycleOutput<Vec<u8>>;

#[fixture]
fn output() -> Output {
    LifecycleOutput::new(Vec::new())
}

#[fixture]
fn pool() -> FakePool {
    FakePool::new(9000, 2)
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

#[rstest]
fn start_launches_every_slot(pool: FakePool, mut output: Output) {
    let exit = pool.supervisor().start(&mut output).expect("start runs");

    assert_eq!(exit, CommandExit::SUCCESS);
    assert_eq!(pool.launched_ports(), vec![9000, 9001]);
    assert!(pool.pidfile_exists(9000));
    assert!(pool.pidfile_exists(9001));
    assert_eq!(stdout(&output), "all 2 workers are running\n");
}

#[rstest]
fn start_never_doubles_a_live_slot(pool: FakePool, mut output: Output) {
    pool.adopt_running(9000);

    let exit = pool.supervisor().start(&mut output).expect("start runs");
    assert_eq!(exit, CommandExit::SUCCESS);
    assert_eq!(pool.launched_ports(), vec![9001]);

    let again = pool.supervisor().start(&mut output).expect("start runs");
    assert_eq!(again, CommandExit::SUCCESS);
    assert_eq!(pool.launched_ports(), vec![9001], "nothing relaunched");
    assert_eq!(pool.live_workers_on(9000), 1);
    assert_eq!(pool.live_workers_on(9001), 1);
}

#[rstest]
fn failed_workers_fail_start_and_lose_their_pidfile(pool: FakePool, mut output: Output) {
    pool.behave(9001, WorkerBehaviour::FailsToBind);
    pool.write_orphan_pidfile(9001);

    let exit = pool.supervisor().start(&mut output).expect("start runs");

    assert_eq!(exit, CommandExit::FAILURE);
    assert!(!pool.pidfile_exists(9001));
    assert!(pool.pidfile_exists(9000));
    assert_eq!(stdout(&output), "1 of 2 workers are running (ports 9000)\n");
}

#[rstest]
fn start_waits_for_launch_commands_to_exit(pool: FakePool, mut output: Output) {
    pool.delay_launch_exit(2);

    let exit = pool.supervisor().start(&mut output).expect("start runs");

    assert_eq!(exit, CommandExit::SUCCESS);
    let timings = pool.settings().timings();
    assert_eq!(
        pool.pauses(),
        vec![
            timings.start_grace,
            timings.start_poll_interval,
            timings.start_poll_interval
        ]
    );
}

#[rstest]
fn start_gives_up_on_unhealthy_workers_after_the_timeout(mut output: Output) {
    let pool = FakePool::with_config(9000, 1, |config| {
        config.start_grace_ms = 500;
        config.start_timeout_ms = 3000;
        config.start_poll_interval_ms = 1000;
    });
    pool.behave(9000, WorkerBehaviour::Hangs);

    let exit = pool.supervisor().start(&mut output).expect("start runs");

    assert_eq!(exit, CommandExit::FAILURE);
    let poll = Duration::from_secs(1);
    assert_eq!(
        pool.pauses(),
        vec![Duration::from_millis(500), poll, poll, poll]
    );
    assert!(pool.pidfile_exists(9000), "live worker keeps its pidfile");
}

#[rstest]
fn start_timeout_counts_time_spent_checking_health(mut output: Output) {
    let pool = FakePool::with_config(9000, 4, |config| {
        config.start_grace_ms = 0;
        config.start_poll_interval_ms = 100;
        config.start_timeout_ms = 300;
    });
    for port in 9000..9004 {
        pool.behave(port, WorkerBehaviour::Hangs);
    }
    pool.slow_health_checks(Duration::from_millis(200));

    let exit = pool.supervisor().start(&mut output).expect("start runs");

    assert_eq!(exit, CommandExit::FAILURE);
    assert_eq!(stdout(&output), "all 4 workers are stopped\n");
    // Two checks exhaust the deadline, then the final status checks all four.
    assert_eq!(pool.elapsed(), Duration::from_millis(1200));
    assert_eq!(pool.pauses(), vec![Duration::ZERO]);
}

#[rstest]
fn unlaunchable_workers_fold_into_the_verdict(mut output: Output) {
    let pool = FakePool::with_config(9000, 2, |config| {
        config.worker_script = Some("/nonexistent/worker".into());
    });

    let exit = pool.supervisor().start(&mut output).expect("start runs");

    assert_eq!(exit, CommandExit::FAILURE);
    assert_eq!(stdout(&output), "all 2 workers are stopped\n");
}

#[rstest]
fn start_requires_launch_settings(mut output: Output) {
    let pool = FakePool::with_config(9000, 2, |config| config.worker_config = None);

    let error = pool
        .supervisor()
        .start(&mut output)
        .expect_err("launch settings are missing");

    assert!(matches!(
        error,
        LifecycleError::Settings(PoolSettingsError::MissingLaunchSetting {
            field: "worker_config"
        })
    ));
    assert!(pool.launched_ports().is_empty());
}

#[rstest]
fn stop_also_terminates_stale_workers(pool: FakePool, mut output: Output) {
    pool.adopt_running(9000);
    pool.adopt_running(7000);

    let exit = pool.supervisor().stop(&mut output).expect("stop runs");

    assert_eq!(exit, CommandExit::SUCCESS);
    assert_eq!(pool.live_workers_on(7000), 0);
    assert!(!pool.pidfile_exists(7000));
    assert!(!pool.pidfile_exists(9000));
    assert_eq!(stdout(&output), "all 2 workers are stopped\n");
}

#[rstest]
fn stop_fails_when_a_worker_survives(pool: FakePool, mut output: Output) {
    pool.behave(9000, WorkerBehaviour::Unkillable);
    pool.adopt_running(9000);

    let exit = pool.supervisor().stop(&mut output).expect("stop runs");

    assert_eq!(exit, CommandExit::FAILURE);
    assert!(pool.pidfile_exists(9000));
}

#[rstest]
fn restart_starts_even_when_stop_fails(pool: FakePool, mut output: Output) {
    pool.behave(9000, WorkerBehaviour::Unkillable);
    pool.adopt_running(9000);

    let exit = pool.supervisor().restart(&mut output).expect("restart runs");

    assert_eq!(exit, CommandExit::FAILURE);
    assert_eq!(pool.launched_ports(), vec![9001]);
    assert_eq!(pool.live_workers_on(9001), 1);
}

#[rstest]
fn restart_replaces_running_workers(pool: FakePool, mut output: Output) {
    let old = pool.adopt_running(9000);
    pool.adopt_running(9001);

    let exit = pool.supervisor().restart(&mut output).expect("restart runs");

    assert_eq!(exit, CommandExit::SUCCESS);
    assert!(pool.signals().contains(&(old, StopSignal::Graceful)));
    assert_eq!(pool.launched_ports(), vec![9000, 9001]);
    assert_eq!(pool.live_workers_on(9000), 1);
}

#[rstest]
fn restart_keeps_the_pool_up_without_launch_settings(mut output: Output) {
    let pool = FakePool::with_config(9000, 2, |config| config.worker_script = None);
    pool.adopt_running(9000);

    assert!(pool.supervisor().restart(&mut output).is_err());
    assert!(pool.signals().is_empty());
    assert_eq!(pool.live_workers_on(9000), 1);
}

#[rstest]
#[case::lsb(StatusConvention::Lsb, CommandExit::new(3))]
#[case::success(StatusConvention::Success, CommandExit::SUCCESS)]
fn stopped_pool_status_follows_convention(
    #[case] convention: StatusConvention,
    #[case] expected: CommandExit,
    mut output: Output,
) {
    let pool = FakePool::with_config(9000, 2, |config| config.status_convention = convention);

    let exit = pool.supervisor().status(None, &mut output).expect("status runs");

    assert_eq!(exit, expected);
}

#[rstest]
#[case::none(None)]
#[case::started(Some(Expectation::Started))]
#[case::stopped(Some(Expectation::Stopped))]
fn partially_running_pool_always_fails(
    pool: FakePool,
    mut output: Output,
    #[case] expect: Option<Expectation>,
) {
    pool.adopt_running(9001);
    let exit = pool.supervisor().status(expect, &mut output).expect("status runs");
    assert_eq!(exit, CommandExit::FAILURE);
    assert_eq!(stdout(&output), "1 of 2 workers are running (ports 9001)\n");
}

#[rstest]
fn stale_workers_do_not_count_towards_status(pool: FakePool, mut output: Output) {
    pool.adopt_running(9000);
    pool.adopt_running(9001);
    pool.adopt_running(7000);

    let supervisor = pool.supervisor();
    assert_eq!(supervisor.stale_ports(), vec![7000]);
    let exit = supervisor.status(None, &mut output).expect("status runs");
    assert_eq!(exit, CommandExit::SUCCESS);
}

#[rstest]
fn liveness_combines_pidfile_and_probe(pool: FakePool) {
    pool.behave(9001, WorkerBehaviour::Hangs);
    pool.adopt_running(9000);
    pool.adopt_running(9001);
    let supervisor = pool.supervisor();

    assert!(supervisor.process_alive(9000));
    assert!(supervisor.service_alive(9000));
    assert!(supervisor.process_alive(9001));
    assert!(!supervisor.service_alive(9001));

    pool.kill_out_of_band(9000);
    assert!(!supervisor.process_alive(9000));
    assert!(pool.pidfile_exists(9000), "pidfile alone does not prove liveness");
}

#[rstest]
fn stop_asks_workers_to_leave_before_signalling(mut output: Output) {
    let pool = FakePool::with_config(9000, 2, |config| config.stop_path = Some("/stop/".into()));
    pool.adopt_running(9000);

    let exit = pool.supervisor().stop(&mut output).expect("stop runs");

    assert_eq!(exit, CommandExit::SUCCESS);
    assert_eq!(pool.stop_requests(), vec![9000, 9001]);
}
