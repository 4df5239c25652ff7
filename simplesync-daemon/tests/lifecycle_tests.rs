//! End-to-end lifecycle runs against stand-in ssh and rsync programs.

#![cfg(unix)]

mod support;

use std::time::Duration;

use simplesync_core::ToolSettings;
use simplesync_daemon::{run_once, run_until, DaemonError, LifecycleState};

use support::{kill_hard, process_dead, wait_until, Sandbox};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn immediate_stop_still_runs_exactly_one_initial_pass() {
    let sandbox = Sandbox::new(0, 0);

    let report = run_until(sandbox.target(), sandbox.settings.clone(), async {})
        .await
        .expect("run");

    assert_eq!(
        report.states,
        vec![
            LifecycleState::Init,
            LifecycleState::Connecting,
            LifecycleState::SyncingInitial,
            LifecycleState::Watching,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]
    );
    assert_eq!(report.passes, 1);
    assert_eq!(report.sessions_started, 1);
    assert_eq!(sandbox.completed_passes(), 1);

    let pids = sandbox.ssh_pids();
    assert_eq!(pids.len(), 1);
    assert!(process_dead(pids[0]), "session must be terminated on stop");
}

#[tokio::test]
async fn local_change_triggers_a_pass_after_the_initial_one() {
    let sandbox = Sandbox::new(0, 0);

    let shutdown = async {
        assert!(wait_until(TIMEOUT, || sandbox.completed_passes() >= 1).await);
        sandbox.touch("edited.txt");
        assert!(
            wait_until(TIMEOUT, || sandbox.completed_passes() >= 2).await,
            "change should trigger a second pass",
        );
    };
    let report = run_until(sandbox.target(), sandbox.settings.clone(), shutdown)
        .await
        .expect("run");

    assert!(report.passes >= 2);
    assert_eq!(report.passes as usize, sandbox.completed_passes());
    assert_eq!(report.failed_passes, 0);
    assert_eq!(report.sessions_started, 1);
}

#[tokio::test]
async fn dead_session_is_respawned_before_the_next_pass() {
    let sandbox = Sandbox::new(0, 0);

    let shutdown = async {
        assert!(wait_until(TIMEOUT, || sandbox.completed_passes() >= 1).await);
        let first = sandbox.ssh_pids()[0];
        kill_hard(first);
        assert!(wait_until(TIMEOUT, || process_dead(first)).await);

        sandbox.touch("after-crash.txt");
        assert!(wait_until(TIMEOUT, || sandbox.completed_passes() >= 2).await);
    };
    let report = run_until(sandbox.target(), sandbox.settings.clone(), shutdown)
        .await
        .expect("run");

    let pids = sandbox.ssh_pids();
    assert_eq!(pids.len(), 2, "exactly one replacement session");
    assert_ne!(pids[0], pids[1]);
    assert_eq!(report.sessions_started, 2);

    let lines = sandbox.lines();
    let second_ssh = lines
        .iter()
        .position(|l| l.starts_with("ssh ") && l != &format!("ssh {}", pids[0]))
        .expect("second ssh line");
    let second_pass = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| *l == "rsync-start")
        .nth(1)
        .map(|(i, _)| i)
        .expect("second pass");
    assert!(
        second_ssh < second_pass,
        "replacement session must start before the pass: {lines:?}"
    );
}

#[tokio::test]
async fn failed_mirror_pass_does_not_stop_the_run() {
    let sandbox = Sandbox::new(23, 0);

    let report = run_once(sandbox.target(), sandbox.settings.clone())
        .await
        .expect("run");

    assert_eq!(report.passes, 1);
    assert_eq!(report.failed_passes, 1);
    assert!(!report.all_passes_succeeded());
    assert_eq!(
        report.states,
        vec![
            LifecycleState::Init,
            LifecycleState::Connecting,
            LifecycleState::SyncingInitial,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]
    );
}

#[tokio::test]
async fn unstartable_remote_shell_is_fatal_and_runs_no_pass() {
    let sandbox = Sandbox::new(0, 0);
    let mut settings = sandbox.settings.clone();
    settings.tools = ToolSettings {
        ssh_program: sandbox.local.join("missing-ssh"),
        ..settings.tools
    };

    let err = run_until(sandbox.target(), settings, async {})
        .await
        .unwrap_err();

    assert!(err.is_connection_failure(), "got: {err}");
    assert_eq!(sandbox.completed_passes(), 0);
}

#[tokio::test]
async fn unwatchable_local_path_fails_after_terminating_the_session() {
    let sandbox = Sandbox::new(0, 0);
    let mut target = sandbox.target();
    target.local_path = sandbox.local.join("does-not-exist");

    let err = run_until(target, sandbox.settings.clone(), async {})
        .await
        .unwrap_err();

    assert!(matches!(err, DaemonError::Notify(_)), "got: {err}");
    let pids = sandbox.ssh_pids();
    assert_eq!(pids.len(), 1);
    assert!(process_dead(pids[0]));
}
