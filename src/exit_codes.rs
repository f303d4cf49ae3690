//! Exit code constants for the redis-runner CLI.
//!
//! On a completed run the CLI exits with the child's own code (or 128 + signal
//! number when the child died from a signal). The constants below are used
//! only when the run itself fails, and are chosen to stay clear of the codes
//! a server normally returns:
//! - 70: supervision failure (EX_SOFTWARE)
//! - 73: ephemeral resource failure (EX_CANTCREAT)
//! - 78: configuration error (EX_CONFIG)
//! - 126: binary found but not executable / spawn refused
//! - 127: binary not found

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// The child could not be forced to exit.
pub const SUPERVISION_FAILURE: i32 = 70;

/// Workspace directory or config file could not be created or removed.
pub const RESOURCE_ERROR: i32 = 73;

/// Config source, include, key or settings problem.
pub const CONFIG_ERROR: i32 = 78;

/// Binary was found but could not be started.
pub const SPAWN_FAILURE: i32 = 126;

/// Binary was not found on the search path.
pub const BINARY_NOT_FOUND: i32 = 127;

/// Offset added to a signal number when the child died from that signal.
pub const SIGNAL_BASE: i32 = 128;
