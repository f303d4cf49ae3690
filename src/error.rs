//! Error types and Result aliases for redis-runner

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::exit_codes;

/// Result type alias for redis-runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
///
/// Callers that only care about *which* part of a run failed (for reporting
/// or exit-code selection) match on this instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Config source, include, key or runtime-settings problem
    Config,
    /// Ephemeral directory/file could not be created or removed
    Resource,
    /// The server binary could not be found on the search path
    BinaryNotFound,
    /// The binary was found but the OS refused to start it
    Spawn,
    /// The child could not be forced to exit
    SupervisionFailure,
}

impl ErrorKind {
    /// Human-readable name used in CLI diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Resource => "ResourceError",
            ErrorKind::BinaryNotFound => "BinaryNotFoundError",
            ErrorKind::Spawn => "SpawnError",
            ErrorKind::SupervisionFailure => "SupervisionFailure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for redis-runner
#[derive(Debug, Error)]
pub enum Error {
    // === Configuration errors ===
    /// Config source could not be read
    #[error("Failed to load config from '{}': {reason}", path.display())]
    ConfigLoadFailed { path: PathBuf, reason: String },

    /// An `include` directive names a file that does not exist
    #[error("Included config '{}' does not exist (included from '{}')", path.display(), from.display())]
    IncludeNotFound { path: PathBuf, from: PathBuf },

    /// An `include` chain refers back to a file already being parsed
    #[error("Config include cycle detected at '{}'", path.display())]
    IncludeCycle { path: PathBuf },

    /// A required key is absent and no default was supplied
    #[error("Config key '{key}' not found")]
    ConfigKeyMissing { key: String },

    /// A key is present but its value cannot be interpreted
    #[error("Config key '{key}' has invalid value '{value}': {reason}")]
    ConfigValueInvalid {
        key: String,
        value: String,
        reason: String,
    },

    /// Runtime settings failed validation
    #[error("Settings validation failed for '{field}': {reason}")]
    SettingsValidationFailed { field: String, reason: String },

    /// Runtime settings file could not be parsed
    #[error("Failed to parse settings '{}': {reason}", path.display())]
    SettingsParseFailed { path: PathBuf, reason: String },

    // === Ephemeral resource errors ===
    /// The supplied parent or working directory does not exist
    #[error("Directory '{}' does not exist", path.display())]
    DirectoryMissing { path: PathBuf },

    /// A uniquely-named ephemeral path already existed
    #[error("Ephemeral path collision at '{}'", path.display())]
    ResourceCollision { path: PathBuf },

    /// Creating, writing or removing the workspace failed
    #[error("Workspace operation '{operation}' failed at '{}': {source}", path.display())]
    WorkspaceIo {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Launch errors ===
    /// Binary not found on the executable search path
    #[error("Binary '{binary}' not found in search path")]
    BinaryNotFound { binary: String },

    /// Binary was found but could not be started
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    // === Supervision errors ===
    /// Child did not exit even after SIGKILL and the final bounded wait
    #[error("Process {pid} could not be reaped within {waited:?} after kill")]
    SupervisionFailure { pid: u32, waited: Duration },

    /// Waiting on or polling the child failed at the OS level
    #[error("Failed to wait on process {pid}: {reason}")]
    WaitFailed { pid: u32, reason: String },

    /// Sending a signal failed for a reason other than the process being gone
    #[error("Failed to send signal '{signal}': {reason}")]
    SignalSendFailed { signal: String, reason: String },

    /// Installing or restoring a signal disposition failed
    #[error("Failed to subscribe to '{signal}': {reason}")]
    SignalSubscribeFailed { signal: String, reason: String },

    /// The worker thread or the scheduler could not be started or joined
    #[error("Execution runtime failed: {reason}")]
    RuntimeFailed { reason: String },

    /// `run` was called on a supervisor that already supervised a process
    #[error("Supervisor already ran process {pid:?}")]
    AlreadySupervised { pid: Option<u32> },

    // === I/O errors ===
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error into the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigLoadFailed { .. }
            | Error::IncludeNotFound { .. }
            | Error::IncludeCycle { .. }
            | Error::ConfigKeyMissing { .. }
            | Error::ConfigValueInvalid { .. }
            | Error::SettingsValidationFailed { .. }
            | Error::SettingsParseFailed { .. } => ErrorKind::Config,

            Error::DirectoryMissing { .. }
            | Error::ResourceCollision { .. }
            | Error::WorkspaceIo { .. }
            | Error::Io(_) => ErrorKind::Resource,

            Error::BinaryNotFound { .. } => ErrorKind::BinaryNotFound,

            Error::SpawnFailed { .. } | Error::AlreadySupervised { .. } => ErrorKind::Spawn,

            Error::SupervisionFailure { .. }
            | Error::WaitFailed { .. }
            | Error::SignalSendFailed { .. }
            | Error::SignalSubscribeFailed { .. }
            | Error::RuntimeFailed { .. } => ErrorKind::SupervisionFailure,
        }
    }

    /// Process exit code the CLI should use when this error ends a run
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Resource => exit_codes::RESOURCE_ERROR,
            ErrorKind::BinaryNotFound => exit_codes::BINARY_NOT_FOUND,
            ErrorKind::Spawn => exit_codes::SPAWN_FAILURE,
            ErrorKind::SupervisionFailure => exit_codes::SUPERVISION_FAILURE,
        }
    }
}

/// A child that exited unsuccessfully
///
/// This is never raised from a run; it is derived from the returned outcome so
/// callers can treat a nonzero exit like any other error if they choose to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Exited on its own with a nonzero code
    #[error("process {pid} exited with code {code}")]
    NonZeroExit { pid: u32, code: i32 },

    /// Terminated by a signal that was not part of an escalation
    #[error("process {pid} was terminated by signal {signal}")]
    Signaled { pid: u32, signal: i32 },
}
