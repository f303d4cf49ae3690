//! Unix signal operations

use crate::error::{Error, Result};
use crate::platform::traits::{SignalDelivery, SignalOps};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal as NixSignal};
use nix::unistd::Pid;

pub struct UnixSignals;

impl UnixSignals {
    pub fn new() -> Self {
        Self
    }

    fn deliver(&self, pid: u32, signal: NixSignal) -> Result<SignalDelivery> {
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Ok(SignalDelivery::Delivered),
            // Already gone (or a zombie we have not reaped yet from another path)
            Err(Errno::ESRCH) => Ok(SignalDelivery::AlreadyExited),
            Err(e) => Err(Error::SignalSendFailed {
                signal: signal.as_str().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl SignalOps for UnixSignals {
    fn send_terminate(&self, pid: u32) -> Result<SignalDelivery> {
        self.deliver(pid, NixSignal::SIGTERM)
    }

    fn send_kill(&self, pid: u32) -> Result<SignalDelivery> {
        self.deliver(pid, NixSignal::SIGKILL)
    }

    fn is_process_running(&self, pid: u32) -> bool {
        // Null signal: existence and permission check only
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }
}
