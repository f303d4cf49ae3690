//! Contract Tests for Supervised Process Lifecycle
//!
//! These tests drive real child processes (small shell scripts) through the
//! supervisor under every execution strategy and check the observed state
//! sequence, exit reporting and workspace cleanup.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use redis_runner::error::{Error, ErrorKind, ProcessError};
use redis_runner::launcher::last_launched_pid;
use redis_runner::models::{ExitReason, ProcessState};
use redis_runner::supervisor::{ExecutionStrategy, Supervisor};
use serial_test::serial;
use nix::sys::signal::{kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use test_utils::fixtures::{entry_count, CHECKS_CONFIG, EXITS_WITH_3, GRACEFUL, IGNORES_TERM, STARTUP_DELAY};
use test_utils::{cancel_after, fake_server, quiet_options, sample_config};

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

fn natural_exit(strategy: ExecutionStrategy) {
    let server = fake_server(EXITS_WITH_3);
    let parent = TempDir::new().unwrap();
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(server.path(), parent.path(), strategy),
    );

    let outcome = supervisor.run().unwrap();

    assert_eq!(
        outcome.states,
        vec![ProcessState::Created, ProcessState::Running, ProcessState::Exited]
    );
    assert_eq!(outcome.exit, ExitReason::Code(3));
    assert_eq!(outcome.cli_exit_code(), 3);
    assert_eq!(
        outcome.process_error(),
        Some(ProcessError::NonZeroExit {
            pid: outcome.pid,
            code: 3
        })
    );
    assert_eq!(supervisor.pid(), Some(outcome.pid));
    assert_eq!(entry_count(parent.path()), 0);
}

fn graceful_termination(strategy: ExecutionStrategy) {
    let server = fake_server(GRACEFUL);
    let parent = TempDir::new().unwrap();
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(server.path(), parent.path(), strategy),
    );

    let canceller = cancel_after(supervisor.cancel_token(), STARTUP_DELAY);
    let outcome = supervisor.run().unwrap();
    canceller.join().unwrap();

    assert_eq!(
        outcome.states,
        vec![
            ProcessState::Created,
            ProcessState::Running,
            ProcessState::Terminating,
            ProcessState::Exited
        ]
    );
    assert_eq!(outcome.exit, ExitReason::Signal(SIGTERM));
    assert!(outcome.escalated);
    assert!(!outcome.was_killed());
    assert!(outcome.is_success());
    assert_eq!(entry_count(parent.path()), 0);
}

fn forced_kill(strategy: ExecutionStrategy) {
    let server = fake_server(IGNORES_TERM);
    let parent = TempDir::new().unwrap();
    let mut options = quiet_options(server.path(), parent.path(), strategy);
    options.grace_period = Duration::from_millis(200);
    let mut supervisor = Supervisor::new(sample_config(), options);

    let canceller = cancel_after(supervisor.cancel_token(), STARTUP_DELAY);
    let outcome = supervisor.run().unwrap();
    canceller.join().unwrap();

    assert_eq!(
        outcome.states,
        vec![
            ProcessState::Created,
            ProcessState::Running,
            ProcessState::Terminating,
            ProcessState::Killed,
            ProcessState::Exited
        ]
    );
    assert_eq!(outcome.exit, ExitReason::Signal(SIGKILL));
    assert!(outcome.was_killed());
    assert_eq!(outcome.cli_exit_code(), 128 + SIGKILL);
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
#[serial]
fn test_natural_exit_blocking() {
    natural_exit(ExecutionStrategy::ThreadBlocking);
}

#[test]
#[serial]
fn test_natural_exit_cooperative() {
    natural_exit(ExecutionStrategy::Cooperative);
}

#[test]
#[serial]
fn test_natural_exit_hybrid() {
    natural_exit(ExecutionStrategy::Hybrid);
}

#[test]
#[serial]
fn test_graceful_termination_blocking() {
    graceful_termination(ExecutionStrategy::ThreadBlocking);
}

#[test]
#[serial]
fn test_graceful_termination_cooperative() {
    graceful_termination(ExecutionStrategy::Cooperative);
}

#[test]
#[serial]
fn test_graceful_termination_hybrid() {
    graceful_termination(ExecutionStrategy::Hybrid);
}

#[test]
#[serial]
fn test_forced_kill_blocking() {
    forced_kill(ExecutionStrategy::ThreadBlocking);
}

#[test]
#[serial]
fn test_forced_kill_cooperative() {
    forced_kill(ExecutionStrategy::Cooperative);
}

#[test]
#[serial]
fn test_forced_kill_hybrid() {
    forced_kill(ExecutionStrategy::Hybrid);
}

#[test]
#[serial]
fn test_config_is_written_before_spawn() {
    for strategy in ExecutionStrategy::ALL {
        let server = fake_server(CHECKS_CONFIG);
        let parent = TempDir::new().unwrap();
        let mut supervisor = Supervisor::new(
            sample_config(),
            quiet_options(server.path(), parent.path(), strategy),
        );

        let outcome = supervisor.run().unwrap();
        assert_eq!(outcome.exit, ExitReason::Code(0), "strategy {}", strategy);
        assert_eq!(outcome.command.len(), 2);
        assert!(outcome.command[1].ends_with(".conf"));
        assert_eq!(entry_count(parent.path()), 0);
    }
}

#[test]
#[serial]
fn test_missing_binary_fails_before_any_file_is_written() {
    let parent = TempDir::new().unwrap();
    let missing = parent.path().join("bin").join("redis-server");
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(&missing, parent.path(), ExecutionStrategy::ThreadBlocking),
    );
    let before = last_launched_pid();

    let err = supervisor.run().unwrap_err();

    assert!(matches!(err, Error::BinaryNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::BinaryNotFound);
    assert_eq!(entry_count(parent.path()), 0);
    assert_eq!(last_launched_pid(), before);
    assert!(supervisor.pid().is_none());
}

#[test]
#[serial]
fn test_caller_working_dir_survives() {
    let server = fake_server(EXITS_WITH_3);
    let parent = TempDir::new().unwrap();
    let working_dir = TempDir::new().unwrap();
    let mut options = quiet_options(server.path(), parent.path(), ExecutionStrategy::Cooperative);
    options.working_dir = Some(working_dir.path().to_path_buf());

    let outcome = Supervisor::new(sample_config(), options).run().unwrap();

    assert!(outcome.command[1].starts_with(&*working_dir.path().to_string_lossy()));
    assert!(working_dir.path().is_dir());
    assert_eq!(entry_count(working_dir.path()), 0);
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
#[serial]
fn test_cancel_after_exit_is_noop() {
    let server = fake_server(EXITS_WITH_3);
    let parent = TempDir::new().unwrap();
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(server.path(), parent.path(), ExecutionStrategy::ThreadBlocking),
    );

    let outcome = supervisor.run().unwrap();
    supervisor.cancel_token().cancel();

    assert_eq!(supervisor.pid(), Some(outcome.pid));
    assert!(matches!(
        supervisor.run(),
        Err(Error::AlreadySupervised { pid: Some(pid) }) if pid == outcome.pid
    ));
}

#[test]
#[serial]
fn test_last_launched_pid_tracks_spawn() {
    let server = fake_server(EXITS_WITH_3);
    let parent = TempDir::new().unwrap();
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(server.path(), parent.path(), ExecutionStrategy::ThreadBlocking),
    );

    let outcome = supervisor.run().unwrap();
    assert_eq!(last_launched_pid(), Some(outcome.pid));
}

#[test]
#[serial]
fn test_sigterm_to_host_stops_blocking_run() {
    host_signal_stops_run(ExecutionStrategy::ThreadBlocking);
}

#[test]
#[serial]
fn test_sigterm_to_host_stops_cooperative_run() {
    host_signal_stops_run(ExecutionStrategy::Cooperative);
}

#[test]
#[serial]
fn test_sigterm_to_host_stops_hybrid_run() {
    host_signal_stops_run(ExecutionStrategy::Hybrid);
}

fn host_signal_stops_run(strategy: ExecutionStrategy) {
    let server = fake_server(GRACEFUL);
    let parent = TempDir::new().unwrap();
    let mut options = quiet_options(server.path(), parent.path(), strategy);
    options.handle_signals = true;
    let mut supervisor = Supervisor::new(sample_config(), options);
    let token = supervisor.cancel_token();

    let sender = std::thread::spawn(|| {
        std::thread::sleep(STARTUP_DELAY);
        kill(Pid::this(), Signal::SIGTERM).unwrap();
    });
    let outcome = supervisor.run().unwrap();
    sender.join().unwrap();

    assert!(token.is_cancelled());
    assert_eq!(
        outcome.states,
        vec![
            ProcessState::Created,
            ProcessState::Running,
            ProcessState::Terminating,
            ProcessState::Exited
        ]
    );
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
#[serial]
async fn test_run_async_cooperative() {
    let server = fake_server(GRACEFUL);
    let parent = TempDir::new().unwrap();
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(server.path(), parent.path(), ExecutionStrategy::Cooperative),
    );

    let token = supervisor.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(STARTUP_DELAY).await;
        token.cancel();
    });

    let outcome = supervisor.run_async().await.unwrap();
    assert_eq!(outcome.exit, ExitReason::Signal(SIGTERM));
    assert_eq!(entry_count(parent.path()), 0);
}

#[tokio::test]
#[serial]
async fn test_run_async_bridges_blocking_strategy() {
    let server = fake_server(IGNORES_TERM);
    let parent = TempDir::new().unwrap();
    let mut options = quiet_options(server.path(), parent.path(), ExecutionStrategy::ThreadBlocking);
    options.grace_period = Duration::ZERO;
    let mut supervisor = Supervisor::new(sample_config(), options);

    let token = supervisor.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(STARTUP_DELAY).await;
        token.cancel();
    });

    let outcome = supervisor.run_async().await.unwrap();
    assert!(outcome.was_killed());
    assert_eq!(outcome.exit, ExitReason::Signal(SIGKILL));
    assert_eq!(entry_count(parent.path()), 0);
}

/// Current SIGINT handler; leaves SIGINT at its default disposition
fn take_sigint_handler() -> SigHandler {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    // SAFETY: installs the default disposition
    let previous = unsafe { sigaction(Signal::SIGINT, &default) }.unwrap();
    previous.handler()
}

fn signal_dispositions_restored_after_run(strategy: ExecutionStrategy) {
    let server = fake_server("exit 0");
    let parent = TempDir::new().unwrap();
    let mut options = quiet_options(server.path(), parent.path(), strategy);
    options.handle_signals = true;

    take_sigint_handler();
    let outcome = Supervisor::new(sample_config(), options).run().unwrap();

    assert!(outcome.is_success());
    assert_eq!(take_sigint_handler(), SigHandler::SigDfl);
}

#[test]
#[serial]
fn test_blocking_run_restores_signal_dispositions() {
    signal_dispositions_restored_after_run(ExecutionStrategy::ThreadBlocking);
}

#[test]
#[serial]
fn test_cooperative_run_restores_signal_dispositions() {
    signal_dispositions_restored_after_run(ExecutionStrategy::Cooperative);
}

#[test]
#[serial]
fn test_hybrid_run_restores_signal_dispositions() {
    signal_dispositions_restored_after_run(ExecutionStrategy::Hybrid);
}

#[tokio::test]
#[serial]
async fn test_dropped_hybrid_run_stops_child_and_cleans_up() {
    let server = fake_server(GRACEFUL);
    let parent = TempDir::new().unwrap();
    let mut supervisor = Supervisor::new(
        sample_config(),
        quiet_options(server.path(), parent.path(), ExecutionStrategy::Hybrid),
    );
    let token = supervisor.cancel_token();

    let abandoned = tokio::time::timeout(STARTUP_DELAY, supervisor.run_async()).await;
    assert!(abandoned.is_err());
    let pid = Pid::from_raw(last_launched_pid().unwrap() as i32);

    // The worker escalates and cleans up on its own thread
    let deadline = Instant::now() + Duration::from_secs(5);
    while (kill(pid, None).is_ok() || entry_count(parent.path()) > 0) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(kill(pid, None).is_err());
    assert_eq!(entry_count(parent.path()), 0);
    assert!(!token.is_cancelled());
}
