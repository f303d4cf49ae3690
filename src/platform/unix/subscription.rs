//! SIGINT/SIGTERM subscription for thread-blocking supervision
//!
//! A [`SignalSubscription`] installs async-signal-safe handlers for the
//! interrupt and termination signals and restores the previous dispositions
//! when the last live subscription is dropped. Handlers only bump atomics; the
//! waiting thread polls [`SignalSubscription::pending`] from its wait loop.
//!
//! Every subscription sees every signal delivered after it was created, so
//! concurrent supervisors in one process do not steal signals from each other.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Mutex;

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::{Error, Result};

/// Signals routed to the cancellation path
const SUBSCRIBED: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Count of handled signals since the process started
static DELIVERED: AtomicU64 = AtomicU64::new(0);

/// Number of the most recently handled signal
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Live subscriber count and the dispositions to restore
static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    subscribers: 0,
    previous: Vec::new(),
});

struct Registry {
    subscribers: usize,
    previous: Vec<(Signal, SigAction)>,
}

extern "C" fn record_signal(signal: libc::c_int) {
    // Async-signal-safe: atomics only
    LAST_SIGNAL.store(signal, Ordering::SeqCst);
    DELIVERED.fetch_add(1, Ordering::SeqCst);
}

/// Scoped interest in SIGINT/SIGTERM
#[derive(Debug)]
pub struct SignalSubscription {
    baseline: u64,
}

impl SignalSubscription {
    /// Install handlers (if this is the first subscriber) and start observing
    pub fn subscribe() -> Result<Self> {
        let mut registry = REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if registry.subscribers == 0 {
            let action = SigAction::new(
                SigHandler::Handler(record_signal),
                SaFlags::SA_RESTART,
                SigSet::empty(),
            );

            let mut previous = Vec::with_capacity(SUBSCRIBED.len());
            for sig in SUBSCRIBED {
                // SAFETY: the handler only touches atomics
                match unsafe { signal::sigaction(sig, &action) } {
                    Ok(old) => previous.push((sig, old)),
                    Err(e) => {
                        restore(&previous);
                        return Err(Error::SignalSubscribeFailed {
                            signal: sig.as_str().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            registry.previous = previous;
            debug!("Installed SIGINT/SIGTERM handlers");
        }

        registry.subscribers += 1;
        Ok(Self {
            baseline: DELIVERED.load(Ordering::SeqCst),
        })
    }

    /// Signal number delivered since this subscription began, if any
    pub fn pending(&self) -> Option<i32> {
        if DELIVERED.load(Ordering::SeqCst) > self.baseline {
            Some(LAST_SIGNAL.load(Ordering::SeqCst))
        } else {
            None
        }
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        let mut registry = REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.subscribers = registry.subscribers.saturating_sub(1);
        if registry.subscribers == 0 {
            let previous = std::mem::take(&mut registry.previous);
            restore(&previous);
            debug!("Restored previous SIGINT/SIGTERM dispositions");
        }
    }
}

fn restore(previous: &[(Signal, SigAction)]) {
    for (sig, action) in previous {
        // SAFETY: reinstating a disposition that was installed before us
        if let Err(e) = unsafe { signal::sigaction(*sig, action) } {
            warn!("Failed to restore {} disposition: {}", sig.as_str(), e);
        }
    }
}
