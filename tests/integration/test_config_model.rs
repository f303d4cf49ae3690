//! Integration Tests for the Server Config Model
//!
//! Exercises parsing from real files, nested includes, round-tripping and
//! the derived port/dir/pidfile accessors through the public API.

use redis_runner::config::{ServerConfig, INCLUDE_KEY};
use redis_runner::error::{Error, ErrorKind};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_nested_includes_are_flattened_in_order() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("conf.d")).unwrap();
    write(
        &dir.path().join("conf.d"),
        "c.conf",
        "save 60 10000\nmaxclients 128\n",
    );
    write(
        &dir.path().join("conf.d"),
        "b.conf",
        "save 300 10\ninclude c.conf\nloglevel notice\n",
    );
    let a = write(
        dir.path(),
        "a.conf",
        "# primary\nsave 900 1\ninclude conf.d/b.conf\nport 6379\n",
    );

    let config = ServerConfig::parse(&a).unwrap();

    assert!(!config.contains_key(INCLUDE_KEY));
    assert_eq!(
        config.get_all_lines("save").unwrap(),
        vec!["save 900 1", "save 300 10", "save 60 10000"]
    );
    assert_eq!(config.get("maxclients").unwrap(), "128");
    assert_eq!(config.get("loglevel").unwrap(), "notice");
    assert_eq!(config.get_port().unwrap(), 6379);
    assert!(!config.assemble().contains("include"));
}

#[test]
fn test_absolute_include() {
    let dir = TempDir::new().unwrap();
    let extra = write(dir.path(), "extra.conf", "appendonly yes\n");
    let main = write(
        dir.path(),
        "main.conf",
        &format!("include {}\nport 7001\n", extra.display()),
    );

    let config = ServerConfig::parse(&main).unwrap();
    assert_eq!(config.get("appendonly").unwrap(), "yes");
    assert_eq!(config.keys().collect::<Vec<_>>(), vec!["port", "appendonly"]);
}

#[test]
fn test_include_cycle_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.conf", "include b.conf\n");
    write(dir.path(), "b.conf", "include a.conf\n");

    let err = ServerConfig::parse(dir.path().join("a.conf")).unwrap_err();
    assert!(matches!(err, Error::IncludeCycle { .. }));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_missing_source_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = ServerConfig::parse(dir.path().join("nope.conf")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = ServerConfig::load(Some(&dir.path().join("nope.conf"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_round_trip_is_idempotent_after_first_normalization() {
    let dir = TempDir::new().unwrap();
    let source = write(
        dir.path(),
        "redis.conf",
        "# header\n\nbind 127.0.0.1   ::1\nsave 900 1 # hourly\n\tsave   300 10\nrename-command CONFIG \"\"\nbind 10.0.0.1\n",
    );

    let first = ServerConfig::parse(&source).unwrap().assemble();
    assert_eq!(
        first,
        "bind 127.0.0.1 ::1\nbind 10.0.0.1\nsave 900 1\nsave 300 10\nrename-command CONFIG \"\""
    );

    let rewritten = write(dir.path(), "normalized.conf", &first);
    let second = ServerConfig::parse(&rewritten).unwrap().assemble();
    assert_eq!(first, second);
}

#[test]
fn test_multiplicity_survives_mutation() {
    let mut config = ServerConfig::parse_str("save 900 1\nsave 300 10\n", None).unwrap();
    config.add("save", "60 10000");
    assert_eq!(config.occurrence_count(), 3);
    assert_eq!(config.len(), 1);
    assert_eq!(
        config.get_all_lines("save").unwrap(),
        vec!["save 900 1", "save 300 10", "save 60 10000"]
    );

    config.set("save", "");
    assert_eq!(config.get_all_lines("save").unwrap(), vec!["save"]);
}

#[test]
fn test_port_derivation() {
    let mut config = ServerConfig::new();
    config.set_dir("/data/redis");
    config.set_port(6380);

    assert_eq!(config.get_port().unwrap(), 6380);
    assert!(config
        .assemble()
        .lines()
        .any(|line| line == "pidfile /data/redis/redis_6380.pid"));
    assert_eq!(config.get_dir().unwrap(), Path::new("/data/redis"));
}

#[test]
fn test_display_and_debug() {
    let config = ServerConfig::parse_str("port 6379\nsave 1 1\nsave 2 2\n", None).unwrap();
    assert_eq!(config.to_string(), config.assemble());
    assert_eq!(format!("{:?}", config), "ServerConfig<[3 items]>");
}
