//! Server configuration model
//!
//! An ordered, multi-valued key/value model for line-oriented server configs
//! such as `redis.conf`. Every key keeps all of its occurrences in the order
//! they were seen, and each occurrence keeps its whitespace-separated tokens,
//! so parsing and re-assembling a file preserves everything but comments and
//! blank lines.
//!
//! ```no_run
//! use redis_runner::config::ServerConfig;
//!
//! # fn main() -> redis_runner::Result<()> {
//! let mut config = ServerConfig::parse("/usr/local/etc/redis.conf")?;
//! config.set_dir("/tmp/redis-scratch");
//! config.set_port(6380);
//! assert_eq!(config.get_port()?, 6380);
//! println!("{}", config.assemble());
//! # Ok(())
//! # }
//! ```

mod parser;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub use parser::{strip_comment, tokenize};

/// System-wide config consulted when no source is given
pub const DEFAULT_SOURCE: &str = "/usr/local/etc/redis.conf";

/// Port used when the caller does not pick one
pub const DEFAULT_PORT: u16 = 6379;

/// Reserved key naming another file to parse and merge
pub const INCLUDE_KEY: &str = "include";

/// Everything from this character to end of line is discarded
pub const COMMENT_MARKER: char = '#';

/// Directory used for the pidfile when no `dir` key is set
pub const DEFAULT_PIDFILE_DIR: &str = "/var/run";

pub const PORT_KEY: &str = "port";
pub const DIR_KEY: &str = "dir";
pub const PIDFILE_KEY: &str = "pidfile";

/// One occurrence of a key: its value split into tokens
pub type Occurrence = Vec<String>;

/// A key together with every occurrence of it, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    key: String,
    occurrences: Vec<Occurrence>,
}

impl ConfigEntry {
    fn new(key: String) -> Self {
        Self {
            key,
            occurrences: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    fn format_line(&self, occurrence: &[String]) -> String {
        if occurrence.is_empty() {
            self.key.clone()
        } else {
            format!("{} {}", self.key, occurrence.join(" "))
        }
    }
}

/// Ordered multimap of config keys to their occurrences
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// Entries in first-seen key order
    entries: Vec<ConfigEntry>,
    /// File this model was parsed from, used to anchor relative includes
    source: Option<PathBuf>,
}

impl ServerConfig {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source` and every file it includes
    pub fn parse(source: impl AsRef<Path>) -> Result<Self> {
        parser::parse_file(source.as_ref(), &mut Vec::new())
    }

    /// Parse `source`, falling back to [`DEFAULT_SOURCE`]
    pub fn load(source: Option<&Path>) -> Result<Self> {
        let path = source.unwrap_or_else(|| Path::new(DEFAULT_SOURCE));
        debug!("Loading server config from {}", path.display());
        Self::parse(path)
    }

    /// Parse in-memory text
    ///
    /// Relative includes are resolved against the directory of `origin`, or
    /// against the current working directory when no origin is given.
    pub fn parse_str(text: &str, origin: Option<&Path>) -> Result<Self> {
        let mut config = parser::parse_text(text);
        config.source = origin.map(Path::to_path_buf);
        config.resolve_includes()?;
        Ok(config)
    }

    /// Flatten every `include` occurrence into this model
    ///
    /// Each included file is parsed (resolving its own includes first) and its
    /// entries are appended in file order. Afterwards no `include` key remains.
    pub fn resolve_includes(&mut self) -> Result<()> {
        let mut stack = Vec::new();
        if let Some(source) = &self.source {
            if let Ok(canonical) = source.canonicalize() {
                stack.push(canonical);
            }
        }
        parser::resolve_includes(self, &mut stack)
    }

    /// File this model was parsed from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn entry(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    fn entry_mut(&mut self, key: &str) -> &mut ConfigEntry {
        let index = match self.entries.iter().position(|entry| entry.key == key) {
            Some(index) => index,
            None => {
                self.entries.push(ConfigEntry::new(key.to_string()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// Whether `key` has at least one occurrence
    pub fn contains_key(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// Value of `key` as a single space-joined string
    ///
    /// When the key occurs several times the first occurrence is returned; use
    /// [`get_all_lines`](Self::get_all_lines) to see all of them.
    pub fn get(&self, key: &str) -> Result<String> {
        self.entry(key)
            .and_then(|entry| entry.occurrences.first())
            .map(|tokens| tokens.join(" "))
            .ok_or_else(|| Error::ConfigKeyMissing {
                key: key.to_string(),
            })
    }

    /// Like [`get`](Self::get) but returns `default` when the key is absent
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|_| default.to_string())
    }

    /// `"key value"` line for the value [`get`](Self::get) would return
    pub fn get_line(&self, key: &str) -> Result<String> {
        let entry = self.entry(key).ok_or_else(|| Error::ConfigKeyMissing {
            key: key.to_string(),
        })?;
        let first = entry.occurrences.first().map(Vec::as_slice).unwrap_or(&[]);
        Ok(entry.format_line(first))
    }

    /// One `"key value"` line per occurrence, in source order
    pub fn get_all_lines(&self, key: &str) -> Result<Vec<String>> {
        let entry = self.entry(key).ok_or_else(|| Error::ConfigKeyMissing {
            key: key.to_string(),
        })?;
        Ok(entry
            .occurrences
            .iter()
            .map(|occurrence| entry.format_line(occurrence))
            .collect())
    }

    /// Every occurrence of `key`, or an empty slice
    pub fn get_all(&self, key: &str) -> &[Occurrence] {
        self.entry(key)
            .map(|entry| entry.occurrences.as_slice())
            .unwrap_or(&[])
    }

    /// Replace all occurrences of `key` with exactly one
    pub fn set(&mut self, key: &str, value: &str) {
        let entry = self.entry_mut(key);
        entry.occurrences.clear();
        entry.occurrences.push(tokenize(value));
    }

    /// Append an occurrence of `key`, keeping existing ones
    pub fn add(&mut self, key: &str, value: &str) {
        self.add_tokens(key, tokenize(value));
    }

    pub(crate) fn add_tokens(&mut self, key: &str, tokens: Occurrence) {
        self.entry_mut(key).occurrences.push(tokens);
    }

    /// Remove `key` entirely, returning its occurrences
    pub fn remove(&mut self, key: &str) -> Vec<Occurrence> {
        match self.entries.iter().position(|entry| entry.key == key) {
            Some(index) => self.entries.remove(index).occurrences,
            None => Vec::new(),
        }
    }

    /// Append every occurrence from `other`, keeping this model's key order
    pub fn merge(&mut self, other: ServerConfig) {
        for entry in other.entries {
            let target = self.entry_mut(&entry.key);
            target.occurrences.extend(entry.occurrences);
        }
    }

    /// Keys in first-seen order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    /// Entries in first-seen order
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// `(key, tokens)` for every occurrence, in assembled order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().flat_map(|entry| {
            entry
                .occurrences
                .iter()
                .map(move |occurrence| (entry.key.as_str(), occurrence.as_slice()))
        })
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total occurrences across all keys
    pub fn occurrence_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.occurrences.len()).sum()
    }

    /// Serialize back to the line-oriented text format
    pub fn assemble(&self) -> String {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .occurrences
                    .iter()
                    .map(move |occurrence| entry.format_line(occurrence))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Set `port` and derive `pidfile` from the current `dir`
    pub fn set_port(&mut self, port: u16) {
        self.set(PORT_KEY, &port.to_string());
        let dir = self
            .get(DIR_KEY)
            .unwrap_or_else(|_| DEFAULT_PIDFILE_DIR.to_string());
        let pidfile = Path::new(&dir).join(format!("redis_{}.pid", port));
        self.set(PIDFILE_KEY, &pidfile.to_string_lossy());
    }

    /// Base-10 value of `port`
    pub fn get_port(&self) -> Result<u16> {
        let value = self.get(PORT_KEY)?;
        value
            .parse::<u16>()
            .map_err(|e| Error::ConfigValueInvalid {
                key: PORT_KEY.to_string(),
                value,
                reason: e.to_string(),
            })
    }

    pub fn set_dir(&mut self, dir: impl AsRef<Path>) {
        self.set(DIR_KEY, &dir.as_ref().to_string_lossy());
    }

    pub fn get_dir(&self) -> Result<PathBuf> {
        self.get(DIR_KEY).map(PathBuf::from)
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.assemble())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerConfig<[{} items]>", self.occurrence_count())?;
        if let Some(source) = &self.source {
            write!(f, " @ {}", source.display())?;
        }
        Ok(())
    }
}
