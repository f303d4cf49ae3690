//! Platform-specific operation traits
//!
//! These traits define the interface for platform-specific operations,
//! allowing for clean abstraction and easier testing.

use crate::error::Result;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Outcome of delivering a signal to a child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    /// The kernel accepted the signal
    Delivered,
    /// The process no longer exists; the desired end state is already reached
    AlreadyExited,
}

/// Platform-specific signal operations
pub trait SignalOps: Send + Sync {
    /// Request a graceful shutdown (SIGTERM)
    fn send_terminate(&self, pid: u32) -> Result<SignalDelivery>;

    /// Force the process to stop (SIGKILL)
    fn send_kill(&self, pid: u32) -> Result<SignalDelivery>;

    /// Check if a process is still running
    fn is_process_running(&self, pid: u32) -> bool;
}

/// Platform-specific filesystem operations
pub trait FilesystemOps: Send + Sync {
    /// Check if a file is executable
    fn is_executable(&self, path: &Path) -> bool;

    /// Find a command in the search path (`PATH` unless overridden)
    fn find_command(&self, command: &str, search_path: Option<&OsStr>) -> Option<PathBuf>;
}

/// Platform-specific path operations
pub trait PathOps: Send + Sync {
    /// Get configuration directory
    fn config_dir(&self) -> Result<PathBuf>;

    /// Get the directory ephemeral workspaces are created under by default
    fn temp_dir(&self) -> PathBuf;
}
