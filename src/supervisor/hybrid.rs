//! Hybrid supervision
//!
//! The thread-blocking supervision runs on one dedicated worker thread and is
//! awaited from the caller's scheduler. The scheduler side owns signal
//! handling and forwards it through the shared cancellation token.
//!
//! The worker watches a child of that token. Dropping the awaiting future
//! cancels it, so the worker escalates, reaps the child and removes the
//! workspace on its own.

use std::thread;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::cooperative::{next_signal, ShutdownSignals};
use super::{blocking, RunPlan};
use crate::error::{Error, Result};
use crate::models::RunOutcome;

/// Name given to the worker thread
const WORKER_NAME: &str = "redis-runner-worker";

pub(crate) async fn run(
    plan: RunPlan,
    cancel: CancellationToken,
    handle_signals: bool,
) -> Result<RunOutcome> {
    let mut signals = if handle_signals {
        Some(ShutdownSignals::subscribe(plan.timing.poll_interval)?)
    } else {
        None
    };

    let worker_cancel = cancel.child_token();
    let _stop_on_drop = worker_cancel.clone().drop_guard();
    // Signals stay with this side; the worker only sees the token
    let mut done = spawn_worker(move || blocking::run(plan, &worker_cancel, false))?;
    debug!("Blocking supervision handed to {}", WORKER_NAME);

    let finished = loop {
        tokio::select! {
            finished = &mut done => break finished,
            name = next_signal(signals.as_mut()) => {
                info!("Received {}, forwarding cancellation to worker", name);
                cancel.cancel();
                signals = None;
            }
        }
    };

    finished.map_err(|_| Error::RuntimeFailed {
        reason: format!("{} exited without reporting a result", WORKER_NAME),
    })?
}

/// Run `job` on a fresh named thread and hand its result back over a channel
fn spawn_worker<T, F>(job: F) -> Result<oneshot::Receiver<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name(WORKER_NAME.to_string())
        .spawn(move || {
            // The receiver is gone only if the caller stopped waiting
            let _ = tx.send(job());
        })
        .map_err(|e| Error::RuntimeFailed {
            reason: format!("failed to start {}: {}", WORKER_NAME, e),
        })?;
    Ok(rx)
}
