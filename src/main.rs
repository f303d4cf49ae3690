//! redis-runner - run a server against an ephemeral config and supervise it
//!
//! Loads runtime settings, applies command-line overrides, and either prints
//! the resolved server config or runs the server until it exits. The process
//! exits with the server's own exit code (128 + signal when it was killed by a
//! signal), or with an error-kind specific code when supervision failed.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use redis_runner::exit_codes;
use redis_runner::settings::{RunnerSettings, SettingsLoader};
use redis_runner::{ExecutionStrategy, NAME, VERSION};

/// Run a server binary against an ephemeral, generated config.
///
/// The server config is read from `--source` (including any files it
/// includes), given a scratch `dir`, `port` and `pidfile`, and written to a
/// temporary file passed as the server's only argument. SIGINT/SIGTERM stop
/// the server gracefully, escalating to SIGKILL after the grace period.
#[derive(Parser, Debug)]
#[command(name = "redis-runner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Runtime settings file (default: search for redis-runner.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Server config to start from (default: /usr/local/etc/redis.conf)
    #[arg(short, long, value_name = "PATH")]
    source: Option<PathBuf>,

    /// Port injected into the generated config
    #[arg(short, long)]
    port: Option<u16>,

    /// Use this directory instead of a temporary one (never deleted)
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Server binary name or path
    #[arg(short, long)]
    binary: Option<String>,

    /// Execution strategy: blocking, cooperative or hybrid
    #[arg(long)]
    strategy: Option<ExecutionStrategy>,

    /// Milliseconds between SIGTERM and SIGKILL
    #[arg(long, value_name = "MS")]
    grace_ms: Option<u64>,

    /// Print the resolved server config and exit without starting the server
    #[arg(long)]
    print_config: bool,

    /// Print the run outcome as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Settings from file, then command-line overrides, then validation
    fn settings(&self) -> redis_runner::Result<RunnerSettings> {
        let mut loader = SettingsLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_explicit_path(path);
        }
        let mut settings = loader.load()?;
        if let Some(path) = loader.current_path() {
            debug!("Using settings from {}", path.display());
        }

        if let Some(source) = &self.source {
            settings.source = Some(source.clone());
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(dir) = &self.dir {
            settings.working_dir = Some(dir.clone());
        }
        if let Some(binary) = &self.binary {
            settings.binary = binary.clone();
        }
        if let Some(strategy) = self.strategy {
            settings.strategy = strategy;
        }
        if let Some(grace_ms) = self.grace_ms {
            settings.grace_period_ms = grace_ms;
        }

        SettingsLoader::validate(&settings)?;
        Ok(settings)
    }
}

fn init_logging(debug: bool) {
    let debug = debug
        || env::var("REDIS_RUNNER_DEBUG")
            .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if debug { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let settings = cli.settings().context("invalid runtime settings")?;

    if cli.print_config {
        let config = redis_runner::load_config(&settings).with_context(|| {
            format!("failed to load {}", settings.source_path().display())
        })?;
        println!("{}", config.assemble());
        return Ok(exit_codes::SUCCESS);
    }

    let outcome = redis_runner::run(&settings).context("supervised run failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    if let Some(process_error) = outcome.process_error() {
        warn!("{}", process_error);
    }

    Ok(outcome.cli_exit_code())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    info!("🚀 Starting {} v{}", NAME, VERSION);

    match run(&cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            let (kind, code) = match err.downcast_ref::<redis_runner::Error>() {
                Some(e) => (e.kind().as_str(), e.exit_code()),
                None => ("Error", 1),
            };
            eprintln!("{}: {:#}", kind, err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
