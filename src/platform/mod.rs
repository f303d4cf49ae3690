//! Platform abstraction layer
//!
//! This module provides a unified interface for the OS operations supervision
//! relies on: signal delivery, signal subscription, executable lookup, and
//! well-known directories. Only Unix-like systems are supported.

#[cfg(test)]
pub(crate) mod mock;
mod traits;
#[cfg(unix)]
mod unix;

pub use traits::*;
#[cfg(unix)]
pub use unix::SignalSubscription;

#[cfg(not(unix))]
compile_error!("redis-runner supervises processes through Unix signals and only builds on Unix");

/// Platform implementation factory
pub struct Platform;

impl Platform {
    /// Get the platform-specific signal operations
    pub fn signals() -> Box<dyn SignalOps> {
        Box::new(unix::UnixSignals::new())
    }

    /// Get the platform-specific filesystem operations
    pub fn filesystem() -> Box<dyn FilesystemOps> {
        Box::new(unix::UnixFilesystem::new())
    }

    /// Get the platform-specific path operations
    pub fn paths() -> Box<dyn PathOps> {
        Box::new(unix::UnixPaths::new())
    }
}
