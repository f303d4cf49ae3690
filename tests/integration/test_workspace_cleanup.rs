//! Integration Tests for Ephemeral Workspace Cleanup
//!
//! Checks that generated files and directories exist only while a workspace
//! is active, on every exit path.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use redis_runner::error::{Error, ErrorKind, Result};
use redis_runner::workspace::EphemeralWorkspace;
use std::fs;
use tempfile::TempDir;
use test_utils::fixtures::entry_count;
use test_utils::sample_config;

#[test]
fn test_generated_config_contents() {
    let parent = TempDir::new().unwrap();
    let mut workspace = EphemeralWorkspace::new(sample_config(), 6380).with_parent(parent.path());

    let config_path = workspace.setup().unwrap().to_path_buf();
    let dir = workspace.dir().unwrap().to_path_buf();
    let written = fs::read_to_string(&config_path).unwrap();

    let expected_pidfile = format!("pidfile {}", dir.join("redis_6380.pid").display());
    assert!(written.lines().any(|line| line == "port 6380"));
    assert!(written.lines().any(|line| line == expected_pidfile));
    assert!(written.lines().any(|line| line == format!("dir {}", dir.display())));
    assert_eq!(
        written.lines().filter(|line| line.starts_with("save ")).count(),
        2
    );
    assert_eq!(workspace.config().get_port().unwrap(), 6380);
}

#[test]
fn test_nothing_remains_after_scoped_success() {
    let parent = TempDir::new().unwrap();
    let mut workspace = EphemeralWorkspace::new(sample_config(), 6379).with_parent(parent.path());

    let seen = workspace
        .scoped(|path| Ok(fs::read_to_string(path)?))
        .unwrap();

    assert!(seen.contains("port 6379"));
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_nothing_remains_after_scoped_error() {
    let parent = TempDir::new().unwrap();
    let mut workspace = EphemeralWorkspace::new(sample_config(), 6379).with_parent(parent.path());

    let result: Result<()> = workspace.scoped(|_| {
        Err(Error::SpawnFailed {
            command: "redis-server".to_string(),
            reason: "simulated".to_string(),
        })
    });

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Spawn);
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_nothing_remains_after_panic() {
    let parent = TempDir::new().unwrap();
    let parent_path = parent.path().to_path_buf();

    let result = std::panic::catch_unwind(move || {
        let mut workspace = EphemeralWorkspace::new(sample_config(), 6379).with_parent(&parent_path);
        workspace.setup().unwrap();
        panic!("caller code failed while the workspace was active");
    });

    assert!(result.is_err());
    assert_eq!(entry_count(parent.path()), 0);
}

#[test]
fn test_caller_supplied_dir_is_kept() {
    let supplied = TempDir::new().unwrap();
    fs::write(supplied.path().join("dump.rdb"), b"existing data").unwrap();

    {
        let mut workspace = EphemeralWorkspace::new(sample_config(), 6379)
            .with_working_dir(Some(supplied.path().to_path_buf()));
        let config_path = workspace.setup().unwrap().to_path_buf();
        assert!(config_path.starts_with(supplied.path()));
        assert_eq!(entry_count(supplied.path()), 2);
    }

    assert!(supplied.path().is_dir());
    assert_eq!(entry_count(supplied.path()), 1);
    assert!(supplied.path().join("dump.rdb").exists());
}

#[test]
fn test_teardown_before_setup_is_harmless() {
    let mut workspace = EphemeralWorkspace::new(sample_config(), 6379);
    workspace.teardown().unwrap();
    assert!(!workspace.is_active());
    assert!(workspace.config_path().is_none());
}
