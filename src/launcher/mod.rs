//! Process Launching
//!
//! Resolves the server binary on the executable search path, builds its
//! argument vector and spawns exactly one OS process per call, either as a
//! blocking `std::process::Child` or as a `tokio::process::Child`. The child's
//! standard streams are redirected to the null device.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::models::ProcessHandle;
use crate::platform::Platform;

/// PID of the most recent successful spawn, 0 when none
static LAST_LAUNCHED_PID: AtomicU32 = AtomicU32::new(0);

/// PID of the most recently launched process in this program
///
/// Diagnostics only; supervision always uses the PID held by its own handle.
pub fn last_launched_pid() -> Option<u32> {
    match LAST_LAUNCHED_PID.load(Ordering::SeqCst) {
        0 => None,
        pid => Some(pid),
    }
}

/// Spawns server processes
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    /// Search path used instead of `PATH`
    search_path: Option<OsString>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve binaries against `search_path` instead of `PATH`
    pub fn with_search_path(search_path: Option<OsString>) -> Self {
        Self { search_path }
    }

    /// Locate `name` on the search path
    ///
    /// Names containing `/` are checked directly. `None` when nothing
    /// executable is found.
    pub fn resolve_binary(&self, name: &str) -> Option<PathBuf> {
        let found = Platform::filesystem().find_command(name, self.search_path.as_deref());
        match &found {
            Some(path) => debug!("Resolved {} to {}", name, path.display()),
            None => debug!("{} not found on search path", name),
        }
        found
    }

    /// Like [`resolve_binary`](Self::resolve_binary), but a miss is an error
    pub fn require_binary(&self, name: &str) -> Result<PathBuf> {
        self.resolve_binary(name).ok_or_else(|| Error::BinaryNotFound {
            binary: name.to_string(),
        })
    }

    /// Full argument vector: the binary followed by its positional arguments
    pub fn build_argv<I, S>(binary: &Path, positional: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        std::iter::once(binary.as_os_str().to_os_string())
            .chain(positional.into_iter().map(Into::into))
            .collect()
    }

    /// Spawn `argv` and return immediately with a running handle
    pub fn spawn_blocking(&self, argv: &[OsString]) -> Result<(ProcessHandle, std::process::Child)> {
        let (program, args) = split_argv(argv)?;
        let mut handle = ProcessHandle::new(argv.to_vec());

        let child = std::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_failed(&handle, e))?;

        record_spawn(&mut handle, child.id());
        Ok((handle, child))
    }

    /// Spawn `argv` on the current tokio runtime
    pub fn spawn_async(&self, argv: &[OsString]) -> Result<(ProcessHandle, tokio::process::Child)> {
        let (program, args) = split_argv(argv)?;
        let mut handle = ProcessHandle::new(argv.to_vec());

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_failed(&handle, e))?;

        // A freshly spawned child always has a PID until it is reaped
        let pid = child.id().ok_or_else(|| Error::SpawnFailed {
            command: handle.command_line(),
            reason: "child was reaped before its PID was read".to_string(),
        })?;

        record_spawn(&mut handle, pid);
        Ok((handle, child))
    }
}

fn split_argv(argv: &[OsString]) -> Result<(&OsString, &[OsString])> {
    argv.split_first().ok_or_else(|| Error::SpawnFailed {
        command: String::new(),
        reason: "empty argument vector".to_string(),
    })
}

fn spawn_failed(handle: &ProcessHandle, e: std::io::Error) -> Error {
    error!("Failed to spawn {}: {}", handle.command_line(), e);
    Error::SpawnFailed {
        command: handle.command_line(),
        reason: e.to_string(),
    }
}

fn record_spawn(handle: &mut ProcessHandle, pid: u32) {
    handle.mark_started(pid);
    LAST_LAUNCHED_PID.store(pid, Ordering::SeqCst);
    info!("Spawned {} (pid {})", handle.command_line(), pid);
}
