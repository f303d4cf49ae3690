//! Mock signal operations for testing escalation paths

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::platform::traits::{SignalDelivery, SignalOps};
use crate::platform::unix::UnixSignals;

/// What the mock does with one kind of signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Send it for real
    Deliver,
    /// Report success without sending anything
    Swallow,
    /// Report a delivery error
    Fail,
}

/// Signal operations with per-signal behavior and a record of every request
pub struct MockSignalOps {
    terminate: Delivery,
    kill: Delivery,
    requested: Mutex<Vec<&'static str>>,
    real: UnixSignals,
}

impl MockSignalOps {
    /// Delivers every signal
    pub fn new() -> Self {
        Self {
            terminate: Delivery::Deliver,
            kill: Delivery::Deliver,
            requested: Mutex::new(Vec::new()),
            real: UnixSignals::new(),
        }
    }

    pub fn with_terminate(mut self, delivery: Delivery) -> Self {
        self.terminate = delivery;
        self
    }

    pub fn with_kill(mut self, delivery: Delivery) -> Self {
        self.kill = delivery;
        self
    }

    /// Signal names in the order they were requested
    pub fn requested(&self) -> Vec<&'static str> {
        self.requested.lock().unwrap().clone()
    }

    fn handle(
        &self,
        name: &'static str,
        delivery: Delivery,
        send: impl FnOnce() -> Result<SignalDelivery>,
    ) -> Result<SignalDelivery> {
        self.requested.lock().unwrap().push(name);
        match delivery {
            Delivery::Deliver => send(),
            Delivery::Swallow => Ok(SignalDelivery::Delivered),
            Delivery::Fail => Err(Error::SignalSendFailed {
                signal: name.to_string(),
                reason: "EPERM".to_string(),
            }),
        }
    }
}

impl SignalOps for MockSignalOps {
    fn send_terminate(&self, pid: u32) -> Result<SignalDelivery> {
        self.handle("SIGTERM", self.terminate, || self.real.send_terminate(pid))
    }

    fn send_kill(&self, pid: u32) -> Result<SignalDelivery> {
        self.handle("SIGKILL", self.kill, || self.real.send_kill(pid))
    }

    fn is_process_running(&self, pid: u32) -> bool {
        self.real.is_process_running(pid)
    }
}
