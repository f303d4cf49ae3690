//! Settings File Loading
//!
//! Finds `redis-runner.toml` in the usual configuration locations, parses it,
//! and validates the result. An explicit path (or `REDIS_RUNNER_CONFIG`) takes
//! precedence over the search.

use super::RunnerSettings;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for in each settings location
pub const SETTINGS_FILE_NAME: &str = "redis-runner.toml";

/// Environment variable naming an explicit settings file
pub const SETTINGS_ENV_VAR: &str = "REDIS_RUNNER_CONFIG";

/// Runtime settings loader
pub struct SettingsLoader {
    /// Directories searched for `redis-runner.toml`, in order
    search_paths: Vec<PathBuf>,
    /// File that must be loaded instead of searching
    explicit_path: Option<PathBuf>,
    /// File the settings were loaded from (if any)
    current_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            explicit_path: env::var_os(SETTINGS_ENV_VAR)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            current_path: None,
        }
    }

    /// Create a loader that only searches the given directories
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            explicit_path: None,
            current_path: None,
        }
    }

    /// Load from `path` instead of searching
    pub fn with_explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Find, parse and validate settings
    ///
    /// Falls back to [`RunnerSettings::default`] when no settings file exists.
    /// An explicit file that is missing or malformed is an error.
    pub fn load(&mut self) -> Result<RunnerSettings> {
        let settings = if let Some(path) = self.explicit_path.clone() {
            if !path.is_file() {
                return Err(Error::ConfigLoadFailed {
                    path,
                    reason: "settings file does not exist".to_string(),
                });
            }
            let settings = Self::load_file(&path)?;
            self.current_path = Some(path);
            settings
        } else if let Some((path, settings)) = self.find_and_load()? {
            self.current_path = Some(path);
            settings
        } else {
            debug!("No {} found, using defaults", SETTINGS_FILE_NAME);
            RunnerSettings::default()
        };

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Parse one settings file
    pub fn load_file(path: &Path) -> Result<RunnerSettings> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings = toml::from_str(&content).map_err(|e| Error::SettingsParseFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings as TOML, creating parent directories
    pub fn save_to_path(settings: &RunnerSettings, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(settings).map_err(|e| Error::SettingsParseFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Find and load settings from the search paths
    fn find_and_load(&self) -> Result<Option<(PathBuf, RunnerSettings)>> {
        for dir in &self.search_paths {
            let candidate = dir.join(SETTINGS_FILE_NAME);
            if !candidate.is_file() {
                continue;
            }

            match Self::load_file(&candidate) {
                Ok(settings) => return Ok(Some((candidate, settings))),
                Err(e) => {
                    // Log warning but continue searching
                    warn!("Skipping settings at {}: {}", candidate.display(), e);
                    continue;
                }
            }
        }

        Ok(None)
    }

    /// Get default search paths for settings files
    fn get_search_paths() -> Vec<PathBuf> {
        use crate::platform::Platform;

        let mut paths = Vec::new();
        let path_ops = Platform::paths();

        if let Ok(config_dir) = path_ops.config_dir() {
            paths.push(config_dir.join("redis-runner"));
        }

        // XDG config home, when it differs from the platform default
        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            let xdg = PathBuf::from(xdg_config).join("redis-runner");
            if !paths.contains(&xdg) {
                paths.push(xdg);
            }
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".redis-runner"));
        }

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd);
        }

        paths
    }

    /// Validate settings
    pub fn validate(settings: &RunnerSettings) -> Result<()> {
        if settings.binary.trim().is_empty() {
            return Err(Error::SettingsValidationFailed {
                field: "binary".to_string(),
                reason: "Binary name cannot be empty".to_string(),
            });
        }

        if settings.port == 0 {
            return Err(Error::SettingsValidationFailed {
                field: "port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if settings.kill_timeout_ms == 0 {
            return Err(Error::SettingsValidationFailed {
                field: "kill_timeout_ms".to_string(),
                reason: "Kill timeout must be greater than 0".to_string(),
            });
        }

        if settings.poll_interval_ms == 0 {
            return Err(Error::SettingsValidationFailed {
                field: "poll_interval_ms".to_string(),
                reason: "Poll interval must be greater than 0".to_string(),
            });
        }

        if settings.poll_interval_ms > settings.kill_timeout_ms {
            return Err(Error::SettingsValidationFailed {
                field: "poll_interval_ms".to_string(),
                reason: "Poll interval cannot exceed the kill timeout".to_string(),
            });
        }

        Ok(())
    }

    /// Get the file the settings were loaded from
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}
