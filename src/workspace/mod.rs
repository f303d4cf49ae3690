//! Ephemeral Workspace
//!
//! A temporary directory holding exactly one generated config file for the
//! duration of a supervised run. The directory and file exist on disk only
//! while the workspace is active; teardown removes both, except that a
//! caller-supplied working directory is left in place.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Prefix of self-created workspace directories
pub const DIR_PREFIX: &str = "redis-";

/// Prefix of the generated config file
pub const CONFIG_PREFIX: &str = "redis-config-";

/// Suffix of the generated config file
pub const CONFIG_SUFFIX: &str = ".conf";

/// Directory backing an active workspace
#[derive(Debug)]
enum WorkspaceDir {
    /// Created by us and removed on teardown
    Temporary(TempDir),
    /// Owned by the caller and never removed
    Supplied(PathBuf),
}

impl WorkspaceDir {
    fn path(&self) -> &Path {
        match self {
            WorkspaceDir::Temporary(dir) => dir.path(),
            WorkspaceDir::Supplied(path) => path,
        }
    }
}

/// Scoped temporary directory and config file for one run
#[derive(Debug)]
pub struct EphemeralWorkspace {
    /// Model written to the config file; `dir`, `port` and `pidfile` are injected on setup
    config: ServerConfig,
    port: u16,
    /// Where self-created directories go (system temp dir when unset)
    parent: Option<PathBuf>,
    /// Caller-owned directory used instead of a temporary one
    working_dir: Option<PathBuf>,
    dir: Option<WorkspaceDir>,
    config_file: Option<TempPath>,
}

impl EphemeralWorkspace {
    pub fn new(config: ServerConfig, port: u16) -> Self {
        Self {
            config,
            port,
            parent: None,
            working_dir: None,
            dir: None,
            config_file: None,
        }
    }

    /// Use a caller-owned directory instead of creating one
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Create temporary directories under `parent` instead of the system temp dir
    pub fn with_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Acquire the directory and write the config file
    ///
    /// Idempotent while active. Returns the path of the generated config.
    pub fn setup(&mut self) -> Result<&Path> {
        let file = match self.config_file.take() {
            Some(file) => file,
            None => self.acquire()?,
        };
        let path: &Path = self.config_file.insert(file);
        Ok(path)
    }

    /// Remove the config file, then the directory if we created it
    ///
    /// Safe to call repeatedly and after a partial setup.
    pub fn teardown(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Some(file) = self.config_file.take() {
            let path = file.to_path_buf();
            if let Err(e) = file.close() {
                if e.kind() != io::ErrorKind::NotFound {
                    first_error = Some(io_failure("remove_file", &path, e));
                }
            }
        }

        match self.dir.take() {
            Some(WorkspaceDir::Temporary(dir)) => {
                let path = dir.path().to_path_buf();
                match dir.close() {
                    Ok(()) => info!("Removed workspace {}", path.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        first_error.get_or_insert(io_failure("remove_dir", &path, e));
                    }
                }
            }
            Some(WorkspaceDir::Supplied(path)) => {
                debug!("Leaving caller-supplied directory {}", path.display());
            }
            None => {}
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run `f` with the config path between setup and teardown
    ///
    /// Teardown happens on every exit path, including a panic in `f`. An error
    /// from `f` takes precedence over a teardown error.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let config_path = self.setup()?.to_path_buf();
        let mut guard = TeardownGuard {
            workspace: self,
            armed: true,
        };

        let result = f(&config_path);

        guard.armed = false;
        let teardown = guard.workspace.teardown();
        let value = result?;
        teardown?;
        Ok(value)
    }

    pub fn is_active(&self) -> bool {
        self.config_file.is_some()
    }

    /// Whether the directory is ours to delete
    pub fn is_temporary(&self) -> bool {
        match &self.dir {
            Some(dir) => matches!(dir, WorkspaceDir::Temporary(_)),
            None => self.working_dir.is_none(),
        }
    }

    /// Generated config file, while active
    pub fn config_path(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Workspace directory, while active
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(WorkspaceDir::path)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn acquire(&mut self) -> Result<TempPath> {
        let dir = self.acquire_dir()?;
        let dir_path = dir.path().to_path_buf();
        self.dir = Some(dir);

        self.config.set_dir(&dir_path);
        self.config.set_port(self.port);

        match write_config(&dir_path, &self.config) {
            Ok(file) => {
                info!(
                    "Workspace ready at {} (config {})",
                    dir_path.display(),
                    file.display()
                );
                Ok(file)
            }
            Err(e) => {
                if let Err(cleanup) = self.teardown() {
                    warn!("Cleanup after failed setup also failed: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn acquire_dir(&self) -> Result<WorkspaceDir> {
        if let Some(path) = &self.working_dir {
            if !path.is_dir() {
                return Err(Error::DirectoryMissing { path: path.clone() });
            }
            return Ok(WorkspaceDir::Supplied(path.clone()));
        }

        let parent = self
            .parent
            .clone()
            .unwrap_or_else(|| Platform::paths().temp_dir());
        if !parent.is_dir() {
            return Err(Error::DirectoryMissing { path: parent });
        }

        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| io_failure("create_dir", &parent, e))?;
        debug!("Created workspace directory {}", dir.path().display());
        Ok(WorkspaceDir::Temporary(dir))
    }
}

impl Drop for EphemeralWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Workspace teardown failed: {}", e);
        }
    }
}

/// Tears the workspace down if the scoped closure unwinds
struct TeardownGuard<'a> {
    workspace: &'a mut EphemeralWorkspace,
    armed: bool,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.workspace.teardown() {
                warn!("Workspace teardown during unwind failed: {}", e);
            }
        }
    }
}

/// Write the assembled config into a fresh file and close the handle
fn write_config(dir: &Path, config: &ServerConfig) -> Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(CONFIG_PREFIX)
        .suffix(CONFIG_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| io_failure("create_file", dir, e))?;

    let mut text = config.assemble();
    text.push('\n');

    let path = file.path().to_path_buf();
    file.write_all(text.as_bytes())
        .and_then(|()| file.flush())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| io_failure("write_config", &path, e))?;

    // Dropping the handle closes it; the path stays owned for teardown
    Ok(file.into_temp_path())
}

fn io_failure(operation: &'static str, path: &Path, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::AlreadyExists {
        Error::ResourceCollision {
            path: path.to_path_buf(),
        }
    } else {
        Error::WorkspaceIo {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}
