//! redis-runner - run a server binary against an ephemeral, generated config
//!
//! This library loads a line-oriented server configuration (such as
//! `redis.conf`), injects a port and a scratch directory, writes the result
//! into a temporary workspace, launches the server against it and supervises
//! the process until it exits.
//!
//! ## Module Organization
//!
//! - [`config`] - Ordered multi-valued config model with include resolution
//! - [`workspace`] - Temporary directory and config file for one run
//! - [`launcher`] - Binary resolution, argument vectors and spawning
//! - [`supervisor`] - Lifecycle state machine and execution strategies
//! - [`settings`] - Runtime settings loaded from `redis-runner.toml`
//! - [`models`] - Process handle and run outcome
//! - [`platform`] - Signals, executable lookup and well-known directories
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use redis_runner::config::ServerConfig;
//! use redis_runner::supervisor::{Supervisor, SupervisorOptions};
//!
//! # fn main() -> redis_runner::Result<()> {
//! let config = ServerConfig::load(None)?;
//! let mut supervisor = Supervisor::new(
//!     config,
//!     SupervisorOptions {
//!         port: 6380,
//!         ..Default::default()
//!     },
//! );
//!
//! // Ctrl-C (or supervisor.cancel_token().cancel()) stops the server gracefully
//! let outcome = supervisor.run()?;
//! println!("server exited: {:?}", outcome.exit);
//! # Ok(())
//! # }
//! ```
//!
//! ## Shutdown
//!
//! Cancellation sends SIGTERM, waits the grace period, sends SIGKILL and waits
//! once more. A process that survives all of that is reported as
//! [`Error::SupervisionFailure`]. The workspace is removed on every path.
//!
//! ## Platform Support
//!
//! Unix only; supervision is built on POSIX signals.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod launcher;
pub mod models;
pub mod platform;
pub mod settings;
pub mod supervisor;
pub mod workspace;

// Re-exports for core functionality
pub use config::ServerConfig;
pub use error::{Error, ErrorKind, ProcessError, Result};
pub use models::{ExitReason, ProcessState, RunOutcome};
pub use settings::{RunnerSettings, SettingsLoader};
pub use supervisor::{ExecutionStrategy, Supervisor, SupervisorOptions};
pub use workspace::EphemeralWorkspace;

/// The current version of redis-runner from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Parse the config source named by `settings`, resolving includes
pub fn load_config(settings: &RunnerSettings) -> Result<ServerConfig> {
    let source = settings.source_path();
    let config = ServerConfig::load(Some(&source))?;
    info!("Loaded {:?} from {}", config, source.display());
    Ok(config)
}

/// Load the config and supervise one server process to completion
///
/// # Errors
///
/// Config, resource, binary-lookup, spawn and supervision failures. A server
/// that exits nonzero is not an error; see [`RunOutcome::process_error`].
pub fn run(settings: &RunnerSettings) -> Result<RunOutcome> {
    let config = load_config(settings)?;
    Supervisor::new(config, settings.supervisor_options()).run()
}
