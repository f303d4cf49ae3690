//! Supervised Process Model
//!
//! Tracks one launched server process: its PID, the argument vector it was
//! started with, and where it is in the supervision state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;

/// Lifecycle state of a supervised process
///
/// ```text
/// Created ──spawn──▶ Running ──exit──────────────────────────────▶ Exited
///                       │                                           ▲
///                       └─cancel─▶ Terminating ──exit───────────────┤
///                                       │                           │
///                                       └─grace elapsed─▶ Killed ───┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessState {
    /// Handle exists but no process has been started
    #[default]
    Created,
    /// Process is running and being waited on
    Running,
    /// SIGTERM sent, waiting out the grace window
    Terminating,
    /// SIGKILL sent, waiting for the final reap
    Killed,
    /// Exit has been observed
    Exited,
}

impl ProcessState {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, Terminating)
                | (Running, Exited)
                | (Terminating, Killed)
                | (Terminating, Exited)
                | (Killed, Exited)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Exited)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Created => "Created",
            ProcessState::Running => "Running",
            ProcessState::Terminating => "Terminating",
            ProcessState::Killed => "Killed",
            ProcessState::Exited => "Exited",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an exited process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Exited with a status code
    Code(i32),
    /// Terminated by a signal
    Signal(i32),
}

impl From<std::process::ExitStatus> for ExitReason {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => ExitReason::Code(code),
            (None, Some(signal)) => ExitReason::Signal(signal),
            // Stopped/continued statuses are never reported by wait here
            (None, None) => ExitReason::Code(-1),
        }
    }
}

/// One supervised OS process
///
/// Created by the launcher in [`ProcessState::Created`]; only the supervisor
/// moves it through the rest of the state machine.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    /// OS process identifier, known once running
    pid: Option<u32>,

    /// Full argument vector, binary first
    argv: Vec<OsString>,

    /// Current state
    state: ProcessState,

    /// Every state visited, starting with `Created`
    history: Vec<ProcessState>,

    /// When the process was started
    start_time: Option<DateTime<Utc>>,

    /// When exit was observed
    end_time: Option<DateTime<Utc>>,

    /// How the process ended
    exit: Option<ExitReason>,
}

impl ProcessHandle {
    pub fn new(argv: Vec<OsString>) -> Self {
        Self {
            pid: None,
            argv,
            state: ProcessState::Created,
            history: vec![ProcessState::Created],
            start_time: None,
            end_time: None,
            exit: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn history(&self) -> &[ProcessState] {
        &self.history
    }

    pub fn exit(&self) -> Option<ExitReason> {
        self.exit
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running)
    }

    pub fn has_exited(&self) -> bool {
        self.state.is_terminal()
    }

    /// Wall-clock time between spawn and observed exit
    pub fn execution_duration(&self) -> Option<std::time::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).to_std().unwrap_or_default())
            }
            _ => None,
        }
    }

    /// Command line rendered for logs
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn transition(&mut self, next: ProcessState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "Ignoring invalid process transition {} -> {}",
                self.state, next
            );
            return;
        }
        debug!("Process {:?}: {} -> {}", self.pid, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    pub(crate) fn mark_started(&mut self, pid: u32) {
        self.pid = Some(pid);
        self.start_time = Some(Utc::now());
        self.transition(ProcessState::Running);
    }

    pub(crate) fn mark_terminating(&mut self) {
        self.transition(ProcessState::Terminating);
    }

    pub(crate) fn mark_killed(&mut self) {
        self.transition(ProcessState::Killed);
    }

    pub(crate) fn mark_exited(&mut self, exit: ExitReason) {
        if self.has_exited() {
            return;
        }
        self.exit = Some(exit);
        self.end_time = Some(Utc::now());
        self.transition(ProcessState::Exited);
    }
}

impl std::fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pid = self.pid.map_or("N/A".to_string(), |pid| pid.to_string());
        write!(f, "{} [{}] - {}", self.command_line(), pid, self.state)?;
        match self.exit {
            Some(ExitReason::Code(code)) => write!(f, " (exit: {})", code),
            Some(ExitReason::Signal(signal)) => write!(f, " (signal: {})", signal),
            None => Ok(()),
        }
    }
}
