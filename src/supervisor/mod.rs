//! Process Supervision
//!
//! A [`Supervisor`] owns one server process from spawn to confirmed exit. It
//! resolves the binary first, writes the generated config into an
//! [`EphemeralWorkspace`], launches the binary against it and waits. When the
//! run is cancelled (SIGINT/SIGTERM to this process, or the cancellation
//! token) it escalates: SIGTERM, a grace window, SIGKILL, one bounded wait.
//!
//! The waiting itself is done by one of three [`ExecutionStrategy`]s:
//! - `ThreadBlocking` polls the child from the calling thread
//! - `Cooperative` awaits the child on a single-threaded tokio runtime
//! - `Hybrid` runs the blocking wait on one dedicated worker thread and awaits it

mod blocking;
mod cooperative;
mod hybrid;

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{ServerConfig, DEFAULT_PORT};
use crate::error::{Error, Result};
use crate::launcher::ProcessLauncher;
use crate::models::RunOutcome;
use crate::platform::Platform;
use crate::settings::DEFAULT_BINARY;
use crate::workspace::EphemeralWorkspace;

/// How a supervised run waits on its child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Poll the child from the calling thread
    #[serde(rename = "blocking", alias = "thread-blocking")]
    ThreadBlocking,
    /// Await the child on a single-threaded scheduler
    #[default]
    Cooperative,
    /// Blocking wait on one worker thread, awaited cooperatively
    Hybrid,
}

impl ExecutionStrategy {
    pub const ALL: [ExecutionStrategy; 3] = [
        ExecutionStrategy::ThreadBlocking,
        ExecutionStrategy::Cooperative,
        ExecutionStrategy::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::ThreadBlocking => "blocking",
            ExecutionStrategy::Cooperative => "cooperative",
            ExecutionStrategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" | "thread-blocking" | "thread" => Ok(ExecutionStrategy::ThreadBlocking),
            "cooperative" | "async" => Ok(ExecutionStrategy::Cooperative),
            "hybrid" => Ok(ExecutionStrategy::Hybrid),
            other => Err(Error::SettingsValidationFailed {
                field: "strategy".to_string(),
                reason: format!(
                    "unknown strategy '{}' (expected blocking, cooperative or hybrid)",
                    other
                ),
            }),
        }
    }
}

/// Everything a supervisor needs besides the config model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Binary name or path
    pub binary: String,
    pub port: u16,
    /// Caller-owned directory for the generated config
    pub working_dir: Option<PathBuf>,
    /// Where temporary workspaces are created (system temp dir when unset)
    pub workspace_parent: Option<PathBuf>,
    /// Time between SIGTERM and SIGKILL; zero kills right after SIGTERM
    pub grace_period: Duration,
    /// Bounded wait after SIGKILL
    pub kill_timeout: Duration,
    /// Poll interval of the blocking wait loop
    pub poll_interval: Duration,
    pub strategy: ExecutionStrategy,
    /// Turn SIGINT/SIGTERM to this process into cancellation
    pub handle_signals: bool,
    /// Search path used instead of `PATH`
    pub search_path: Option<OsString>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            port: DEFAULT_PORT,
            working_dir: None,
            workspace_parent: None,
            grace_period: Duration::from_secs(1),
            kill_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(25),
            strategy: ExecutionStrategy::default(),
            handle_signals: true,
            search_path: None,
        }
    }
}

/// Escalation timing shared by every strategy
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timing {
    pub grace_period: Duration,
    pub kill_timeout: Duration,
    pub poll_interval: Duration,
}

/// A resolved binary and an inactive workspace, ready to launch
#[derive(Debug)]
pub(crate) struct RunPlan {
    pub launcher: ProcessLauncher,
    pub binary: PathBuf,
    pub workspace: EphemeralWorkspace,
    pub timing: Timing,
}

/// Supervises exactly one server process
#[derive(Debug)]
pub struct Supervisor {
    /// Taken by the first run
    config: Option<ServerConfig>,
    options: SupervisorOptions,
    launcher: ProcessLauncher,
    cancel: CancellationToken,
    pid: Option<u32>,
}

impl Supervisor {
    pub fn new(config: ServerConfig, options: SupervisorOptions) -> Self {
        let launcher = ProcessLauncher::with_search_path(options.search_path.clone());
        Self {
            config: Some(config),
            options,
            launcher,
            cancel: CancellationToken::new(),
            pid: None,
        }
    }

    /// Handle that requests a graceful stop of the run
    ///
    /// Cancelling before the child is spawned makes the run escalate right
    /// after spawn; cancelling after exit has no effect.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// PID of the supervised process, once it has been spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.options.strategy
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Run to completion on the calling thread
    ///
    /// The cooperative and hybrid strategies drive a private single-threaded
    /// runtime, so this must not be called from inside an async context; use
    /// [`run_async`](Self::run_async) there.
    pub fn run(&mut self) -> Result<RunOutcome> {
        // Refused before the config is taken so run_async() remains available
        let runtime = match self.options.strategy {
            ExecutionStrategy::ThreadBlocking => None,
            ExecutionStrategy::Cooperative | ExecutionStrategy::Hybrid => Some(scheduler()?),
        };
        let plan = self.prepare()?;
        info!(
            "Supervising {} ({} strategy)",
            plan.binary.display(),
            self.options.strategy
        );

        let cancel = self.cancel.clone();
        let handle_signals = self.options.handle_signals;
        let result = match (self.options.strategy, runtime) {
            (ExecutionStrategy::Cooperative, Some(runtime)) => {
                runtime.block_on(cooperative::run(plan, cancel, handle_signals))
            }
            (ExecutionStrategy::Hybrid, Some(runtime)) => {
                runtime.block_on(hybrid::run(plan, cancel, handle_signals))
            }
            _ => blocking::run(plan, &cancel, handle_signals),
        };

        self.finish(result)
    }

    /// Run to completion on the caller's runtime
    ///
    /// `ThreadBlocking` cannot wait on an async worker, so it is bridged the
    /// same way as `Hybrid`.
    pub async fn run_async(&mut self) -> Result<RunOutcome> {
        let plan = self.prepare()?;
        info!(
            "Supervising {} ({} strategy, async caller)",
            plan.binary.display(),
            self.options.strategy
        );

        let result = match self.options.strategy {
            ExecutionStrategy::Cooperative => {
                cooperative::run(plan, self.cancel.clone(), self.options.handle_signals).await
            }
            ExecutionStrategy::ThreadBlocking | ExecutionStrategy::Hybrid => {
                hybrid::run(plan, self.cancel.clone(), self.options.handle_signals).await
            }
        };

        self.finish(result)
    }

    /// Resolve the binary, then build the (not yet created) workspace
    fn prepare(&mut self) -> Result<RunPlan> {
        let config = self
            .config
            .take()
            .ok_or(Error::AlreadySupervised { pid: self.pid })?;

        // Fail fast: nothing touches the filesystem before the binary is found
        let binary = self.launcher.require_binary(&self.options.binary)?;

        let mut workspace = EphemeralWorkspace::new(config, self.options.port)
            .with_working_dir(self.options.working_dir.clone());
        if let Some(parent) = &self.options.workspace_parent {
            workspace = workspace.with_parent(parent.clone());
        }

        Ok(RunPlan {
            launcher: self.launcher.clone(),
            binary,
            workspace,
            timing: Timing {
                grace_period: self.options.grace_period,
                kill_timeout: self.options.kill_timeout,
                poll_interval: self.options.poll_interval,
            },
        })
    }

    fn finish(&mut self, result: Result<RunOutcome>) -> Result<RunOutcome> {
        match &result {
            Ok(outcome) => {
                self.pid = Some(outcome.pid);
                info!(
                    "Process {} finished: {:?} after {} ms",
                    outcome.pid, outcome.exit, outcome.duration_ms
                );
            }
            Err(Error::SupervisionFailure { pid, .. }) => {
                self.pid = Some(*pid);
                if Platform::signals().is_process_running(*pid) {
                    error!("Process {} could not be stopped and is still present", pid);
                } else {
                    error!("Process {} was not reaped in time", pid);
                }
            }
            Err(e) => error!("Supervision failed: {}", e),
        }
        result
    }
}

/// Single-threaded scheduler for one run
fn scheduler() -> Result<tokio::runtime::Runtime> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::RuntimeFailed {
            reason: "run() called inside an async runtime; use run_async()".to_string(),
        });
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::RuntimeFailed {
            reason: e.to_string(),
        })
}
