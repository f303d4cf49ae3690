//! Line parsing and include resolution for [`ServerConfig`]

use std::fs;
use std::path::{Path, PathBuf};

use super::{Occurrence, ServerConfig, COMMENT_MARKER, INCLUDE_KEY};
use crate::error::{Error, Result};

/// Drop everything from the comment marker to end of line
pub fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_MARKER) {
        Some(index) => &line[..index],
        None => line,
    }
}

/// Split a value into whitespace-separated tokens
pub fn tokenize(value: &str) -> Occurrence {
    value.split_whitespace().map(str::to_string).collect()
}

/// Split one record into key and tokens, or `None` for comment/blank lines
pub(crate) fn parse_line(line: &str) -> Option<(&str, Occurrence)> {
    let content = strip_comment(line).trim();
    if content.is_empty() {
        return None;
    }

    match content.split_once(char::is_whitespace) {
        Some((key, value)) => Some((key, tokenize(value))),
        None => Some((content, Vec::new())),
    }
}

/// Parse text without touching the filesystem; includes stay unresolved
pub(crate) fn parse_text(text: &str) -> ServerConfig {
    let mut config = ServerConfig::new();
    for (key, tokens) in text.lines().filter_map(parse_line) {
        config.add_tokens(key, tokens);
    }
    config
}

/// Parse a file and, recursively, everything it includes
///
/// `stack` holds the canonical paths currently being parsed and is used to
/// reject include cycles.
pub(crate) fn parse_file(path: &Path, stack: &mut Vec<PathBuf>) -> Result<ServerConfig> {
    let canonical = path.canonicalize().map_err(|e| Error::ConfigLoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if stack.contains(&canonical) {
        return Err(Error::IncludeCycle { path: canonical });
    }

    let text = fs::read_to_string(&canonical).map_err(|e| Error::ConfigLoadFailed {
        path: canonical.clone(),
        reason: e.to_string(),
    })?;

    let mut config = parse_text(&text);
    config.source = Some(canonical.clone());

    stack.push(canonical);
    let resolved = resolve_includes(&mut config, stack);
    stack.pop();
    resolved?;

    trace!(
        "Parsed {} ({} keys, {} occurrences)",
        path.display(),
        config.len(),
        config.occurrence_count()
    );
    Ok(config)
}

/// Pop every `include` occurrence and merge the referenced files in order
pub(crate) fn resolve_includes(config: &mut ServerConfig, stack: &mut Vec<PathBuf>) -> Result<()> {
    let includes = config.remove(INCLUDE_KEY);
    if includes.is_empty() {
        return Ok(());
    }

    let origin = config
        .source
        .clone()
        .unwrap_or_else(|| PathBuf::from("<memory>"));
    let base_dir = include_base_dir(config.source.as_deref(), std::env::current_dir)?;

    for occurrence in includes {
        let target = include_target(&base_dir, &occurrence);
        if !target.exists() {
            return Err(Error::IncludeNotFound {
                path: target,
                from: origin,
            });
        }

        debug!("Including {} from {}", target.display(), origin.display());
        let included = parse_file(&target, stack)?;
        config.merge(included);
    }

    Ok(())
}

/// Directory relative includes resolve against: the including file's, or the
/// working directory for in-memory text
fn include_base_dir(
    source: Option<&Path>,
    current_dir: impl FnOnce() -> std::io::Result<PathBuf>,
) -> Result<PathBuf> {
    if let Some(parent) = source.and_then(Path::parent) {
        return Ok(parent.to_path_buf());
    }

    current_dir().map_err(|e| Error::ConfigLoadFailed {
        path: PathBuf::from("."),
        reason: format!("cannot resolve relative includes: {}", e),
    })
}

/// Absolute path named by one `include` occurrence
fn include_target(base_dir: &Path, occurrence: &[String]) -> PathBuf {
    let named = PathBuf::from(occurrence.join(" "));
    if named.is_absolute() {
        named
    } else {
        base_dir.join(named)
    }
}
