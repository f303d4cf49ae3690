//! Result of one supervised run

use serde::{Deserialize, Serialize};

use super::process_handle::{ExitReason, ProcessHandle, ProcessState};
use crate::error::ProcessError;
use crate::exit_codes;

/// What happened to the supervised process
///
/// A nonzero exit is data, not an error: inspect [`process_error`](Self::process_error)
/// to decide whether the run counts as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// PID the process ran as
    pub pid: u32,
    /// Command line the process was started with
    pub command: Vec<String>,
    /// How the process ended
    pub exit: ExitReason,
    /// Whether the supervisor had to request termination
    pub escalated: bool,
    /// States visited, `Created` first and `Exited` last
    pub states: Vec<ProcessState>,
    /// Milliseconds between spawn and observed exit
    pub duration_ms: u64,
}

impl RunOutcome {
    /// Build an outcome from a handle that has reached `Exited`
    pub(crate) fn from_handle(handle: &ProcessHandle, exit: ExitReason) -> Self {
        let states = handle.history().to_vec();
        Self {
            pid: handle.pid().unwrap_or_default(),
            command: handle
                .argv()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            exit,
            escalated: states.contains(&ProcessState::Terminating),
            states,
            duration_ms: handle
                .execution_duration()
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }

    /// The child's own exit code, if it exited with one
    pub fn exit_code(&self) -> Option<i32> {
        match self.exit {
            ExitReason::Code(code) => Some(code),
            ExitReason::Signal(_) => None,
        }
    }

    /// Whether the kill escalation step was needed
    pub fn was_killed(&self) -> bool {
        self.states.contains(&ProcessState::Killed)
    }

    pub fn is_success(&self) -> bool {
        self.process_error().is_none()
    }

    /// Nonzero exit recorded as an error value
    ///
    /// Signal deaths that the supervisor itself caused during escalation are
    /// expected and are not reported.
    pub fn process_error(&self) -> Option<ProcessError> {
        match self.exit {
            ExitReason::Code(0) => None,
            ExitReason::Code(code) => Some(ProcessError::NonZeroExit {
                pid: self.pid,
                code,
            }),
            ExitReason::Signal(_) if self.escalated => None,
            ExitReason::Signal(signal) => Some(ProcessError::Signaled {
                pid: self.pid,
                signal,
            }),
        }
    }

    /// Code a CLI wrapping this run should exit with
    pub fn cli_exit_code(&self) -> i32 {
        match self.exit {
            ExitReason::Code(code) => code,
            ExitReason::Signal(signal) => exit_codes::SIGNAL_BASE + signal,
        }
    }
}
