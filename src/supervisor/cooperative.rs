//! Cooperative supervision
//!
//! Spawn and exit-await are suspension points on the current tokio runtime.
//! SIGINT/SIGTERM arrive through the run's [`SignalSubscription`], checked on
//! a `tokio::time` interval, and fire the shared cancellation token;
//! escalation delays use `tokio::time`.

use std::ffi::OsString;
use std::process::ExitStatus;

use nix::sys::signal::Signal;
use tokio::process::Child;
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{RunPlan, Timing};
use crate::error::{Error, Result};
use crate::launcher::ProcessLauncher;
use crate::models::{ExitReason, ProcessHandle, RunOutcome};
use crate::platform::{Platform, SignalDelivery, SignalOps, SignalSubscription};

/// Set up the workspace, supervise one child, tear the workspace down
pub(crate) async fn run(
    plan: RunPlan,
    cancel: CancellationToken,
    handle_signals: bool,
) -> Result<RunOutcome> {
    let RunPlan {
        launcher,
        binary,
        mut workspace,
        timing,
    } = plan;

    let mut signals = if handle_signals {
        Some(ShutdownSignals::subscribe(timing.poll_interval)?)
    } else {
        None
    };

    let config_path = workspace.setup()?.to_path_buf();
    let argv = ProcessLauncher::build_argv(&binary, [config_path.as_os_str()]);

    let ops = Platform::signals();
    // The workspace's Drop covers a dropped future; explicit teardown reports errors
    let result = supervise(
        &launcher,
        &argv,
        timing,
        &cancel,
        signals.as_mut(),
        ops.as_ref(),
    )
    .await;
    let teardown = workspace.teardown();

    let outcome = result?;
    teardown?;
    Ok(outcome)
}

async fn supervise(
    launcher: &ProcessLauncher,
    argv: &[OsString],
    timing: Timing,
    cancel: &CancellationToken,
    mut signals: Option<&mut ShutdownSignals>,
    ops: &dyn SignalOps,
) -> Result<RunOutcome> {
    let (mut handle, mut child) = launcher.spawn_async(argv)?;
    let pid = handle.pid().unwrap_or_default();

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| wait_failed(pid, e))?;
            return Ok(exited(&mut handle, status));
        }
        _ = cancel.cancelled() => {
            info!("Cancellation requested, stopping process {}", pid);
        }
        name = next_signal(signals.as_deref_mut()) => {
            info!("Received {}, stopping process {}", name, pid);
            cancel.cancel();
        }
    }

    escalate(&mut handle, &mut child, pid, timing, ops).await
}

/// SIGTERM, grace window, SIGKILL, bounded wait
///
/// Delivery failures are logged and escalation continues.
async fn escalate(
    handle: &mut ProcessHandle,
    child: &mut Child,
    pid: u32,
    timing: Timing,
    signals: &dyn SignalOps,
) -> Result<RunOutcome> {
    handle.mark_terminating();
    match signals.send_terminate(pid) {
        Ok(SignalDelivery::AlreadyExited) => debug!("Process {} was already gone at SIGTERM", pid),
        Ok(SignalDelivery::Delivered) => info!("Sent SIGTERM to process {}", pid),
        Err(e) => warn!("{}; escalating to SIGKILL", e),
    }

    if let Ok(status) = timeout(timing.grace_period, child.wait()).await {
        let status = status.map_err(|e| wait_failed(pid, e))?;
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

    match timeout(timing.kill_timeout, child.wait()).await {
        Ok(status) => {
            let status = status.map_err(|e| wait_failed(pid, e))?;
            Ok(exited(handle, status))
        }
        Err(_) => Err(Error::SupervisionFailure {
            pid,
            waited: timing.kill_timeout,
        }),
    }
}

/// SIGINT/SIGTERM interest for the duration of a run
///
/// Dropping it releases the subscription, which restores the previous
/// dispositions once no other run holds one.
pub(super) struct ShutdownSignals {
    subscription: SignalSubscription,
    ticks: Interval,
}

impl ShutdownSignals {
    /// Must be called inside a runtime with the time driver enabled
    pub(super) fn subscribe(poll_interval: std::time::Duration) -> Result<Self> {
        // interval() rejects a zero period
        let mut ticks = interval(poll_interval.max(std::time::Duration::from_millis(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            subscription: SignalSubscription::subscribe()?,
            ticks,
        })
    }

    /// Name of the first signal delivered since subscribing
    pub(super) async fn recv(&mut self) -> &'static str {
        loop {
            self.ticks.tick().await;
            if let Some(number) = self.subscription.pending() {
                return Signal::try_from(number).map_or("signal", Signal::as_str);
            }
        }
    }
}

/// Next shutdown signal, or never when signals are not handled
pub(super) async fn next_signal(signals: Option<&mut ShutdownSignals>) -> &'static str {
    match signals {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}

fn wait_failed(pid: u32, e: std::io::Error) -> Error {
    Error::WaitFailed {
        pid,
        reason: e.to_string(),
    }
}

fn exited(handle: &mut ProcessHandle, status: ExitStatus) -> RunOutcome {
    let reason = ExitReason::from(status);
    handle.mark_exited(reason);
    info!("Process {:?} exited: {:?}", handle.pid(), reason);
    RunOutcome::from_handle(handle, reason)
}
