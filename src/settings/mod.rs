//! Runtime Settings
//!
//! Knobs for one supervised run that are not part of the server's own config
//! text: which binary to launch, where its workspace lives, escalation timing
//! and the execution strategy. Loaded from `redis-runner.toml` and overridden
//! by CLI flags.

mod loader;

pub use loader::{SettingsLoader, SETTINGS_ENV_VAR, SETTINGS_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DEFAULT_PORT, DEFAULT_SOURCE};
use crate::supervisor::{ExecutionStrategy, SupervisorOptions};

/// Name of the server binary looked up when none is configured
pub const DEFAULT_BINARY: &str = "redis-server";

/// Settings for a supervised run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Binary name or path to launch
    pub binary: String,

    /// Config source to start from (default `/usr/local/etc/redis.conf`)
    pub source: Option<PathBuf>,

    /// Port injected into the generated config
    pub port: u16,

    /// Caller-owned working directory; never deleted when set
    pub working_dir: Option<PathBuf>,

    /// Time between SIGTERM and SIGKILL
    pub grace_period_ms: u64,

    /// Time to wait for the reap after SIGKILL
    pub kill_timeout_ms: u64,

    /// Wait-loop poll interval for the thread-blocking strategy
    pub poll_interval_ms: u64,

    /// How the run is executed
    pub strategy: ExecutionStrategy,

    /// Whether SIGINT/SIGTERM to this process cancel the run
    pub handle_signals: bool,

    /// Search path used instead of `PATH` when resolving the binary
    pub search_path: Option<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            source: None,
            port: DEFAULT_PORT,
            working_dir: None,
            grace_period_ms: 1000,
            kill_timeout_ms: 5000,
            poll_interval_ms: 25,
            strategy: ExecutionStrategy::default(),
            handle_signals: true,
            search_path: None,
        }
    }
}

impl RunnerSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Config source, falling back to the default location
    pub fn source_path(&self) -> PathBuf {
        self.source
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE))
    }

    pub fn search_path(&self) -> Option<OsString> {
        self.search_path.as_ref().map(OsString::from)
    }

    /// Supervisor options derived from these settings
    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            binary: self.binary.clone(),
            port: self.port,
            working_dir: self.working_dir.clone(),
            workspace_parent: None,
            grace_period: self.grace_period(),
            kill_timeout: self.kill_timeout(),
            poll_interval: self.poll_interval(),
            strategy: self.strategy,
            handle_signals: self.handle_signals,
            search_path: self.search_path(),
        }
    }
}
