//! Thread-blocking supervision
//!
//! The calling thread spawns the child and polls it with `try_wait`, checking
//! the cancellation token and the signal subscription between polls.

use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::{RunPlan, Timing};
use crate::error::{Error, Result};
use crate::launcher::ProcessLauncher;
use crate::models::{ExitReason, ProcessHandle, RunOutcome};
use crate::platform::{Platform, SignalDelivery, SignalOps, SignalSubscription};

/// Set up the workspace, supervise one child, tear the workspace down
pub(crate) fn run(
    plan: RunPlan,
    cancel: &CancellationToken,
    handle_signals: bool,
) -> Result<RunOutcome> {
    let RunPlan {
        launcher,
        binary,
        mut workspace,
        timing,
    } = plan;

    // Subscribed before anything is created so an early Ctrl-C is not lost
    let subscription = if handle_signals {
        Some(SignalSubscription::subscribe()?)
    } else {
        None
    };

    let signals = Platform::signals();
    workspace.scoped(|config_path| {
        let argv = ProcessLauncher::build_argv(&binary, [config_path.as_os_str()]);
        supervise(
            &launcher,
            &argv,
            timing,
            cancel,
            subscription.as_ref(),
            signals.as_ref(),
        )
    })
}

fn supervise(
    launcher: &ProcessLauncher,
    argv: &[std::ffi::OsString],
    timing: Timing,
    cancel: &CancellationToken,
    subscription: Option<&SignalSubscription>,
    signals: &dyn SignalOps,
) -> Result<RunOutcome> {
    let (mut handle, mut child) = launcher.spawn_blocking(argv)?;
    let pid = child.id();

    loop {
        if let Some(status) = poll(&mut child, pid)? {
            return Ok(exited(&mut handle, status));
        }

        if cancel.is_cancelled() {
            info!("Cancellation requested, stopping process {}", pid);
            break;
        }

        if let Some(signal) = subscription.and_then(SignalSubscription::pending) {
            info!("Received signal {}, stopping process {}", signal, pid);
            cancel.cancel();
            break;
        }

        thread::sleep(timing.poll_interval);
    }

    escalate(&mut handle, &mut child, timing, signals)
}

/// SIGTERM, grace window, SIGKILL, bounded wait
///
/// Delivery failures are logged and escalation continues; the child is
/// always waited on.
fn escalate(
    handle: &mut ProcessHandle,
    child: &mut Child,
    timing: Timing,
    signals: &dyn SignalOps,
) -> Result<RunOutcome> {
    let pid = child.id();

    handle.mark_terminating();
    match signals.send_terminate(pid) {
        Ok(SignalDelivery::AlreadyExited) => debug!("Process {} was already gone at SIGTERM", pid),
        Ok(SignalDelivery::Delivered) => info!("Sent SIGTERM to process {}", pid),
        Err(e) => warn!("{}; escalating to SIGKILL", e),
    }

    if let Some(status) = wait_timeout(child, pid, timing.grace_period, timing.poll_interval)? {
        return Ok(exited(handle, status));
    }

    handle.mark_killed();
    warn!(
        "Process {} still running after {:?}, sending SIGKILL",
        pid, timing.grace_period
    );
    match signals.send_kill(pid) {
        Ok(SignalDelivery::AlreadyExited) => debug!("Process {} was already gone at SIGKILL", pid),
        Ok(SignalDelivery::Delivered) => {}
        Err(e) => warn!("{}; waiting for process {} anyway", e, pid),
    }

    match wait_timeout(child, pid, timing.kill_timeout, timing.poll_interval)? {
        Some(status) => Ok(exited(handle, status)),
        None => Err(Error::SupervisionFailure {
            pid,
            waited: timing.kill_timeout,
        }),
    }
}

/// Poll until the child exits or `limit` elapses
fn wait_timeout(
    child: &mut Child,
    pid: u32,
    limit: Duration,
    poll_interval: Duration,
) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = poll(child, pid)? {
            return Ok(Some(status));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

fn poll(child: &mut Child, pid: u32) -> Result<Option<ExitStatus>> {
    child.try_wait().map_err(|e| Error::WaitFailed {
        pid,
        reason: e.to_string(),
    })
}

fn exited(handle: &mut ProcessHandle, status: ExitStatus) -> RunOutcome {
    let reason = ExitReason::from(status);
    handle.mark_exited(reason);
    info!("Process {:?} exited: {:?}", handle.pid(), reason);
    RunOutcome::from_handle(handle, reason)
}
