//! Journal data: the host's key/value description of one invocation and the
//! descriptor built from it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use thiserror::Error;

pub const SCRIPT_SOURCE: &str = "ScriptSource";
pub const SEARCH_PATHS: &str = "SearchPaths";
pub const LOG_FILE: &str = "LogFile";
pub const DEBUG_MODE: &str = "DebugMode";

pub const SEARCH_PATH_DELIMITER: char = ';';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("journal data is missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("invalid journal entry `{0}`: expected KEY=VALUE")]
    MalformedEntry(String),
}

/// What to run, where to find its modules and where to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationDescriptor {
    pub script_source: PathBuf,
    pub search_paths: Vec<PathBuf>,
    pub log_file: PathBuf,
    pub debug: bool,
}

impl InvocationDescriptor {
    pub fn from_journal(data: &HashMap<String, String>) -> Result<Self, JournalError> {
        let script_source = required(data, SCRIPT_SOURCE)?;
        let search_paths = data
            .get(SEARCH_PATHS)
            .ok_or(JournalError::MissingKey(SEARCH_PATHS))?;
        let log_file = required(data, LOG_FILE)?;
        let debug = data.get(DEBUG_MODE).is_some_and(|v| parse_flag(v));

        Ok(Self {
            script_source: PathBuf::from(script_source),
            search_paths: split_search_paths(search_paths),
            log_file: PathBuf::from(log_file),
            debug,
        })
    }
}

fn required<'a>(data: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, JournalError> {
    data.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(JournalError::MissingKey(key))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Split a `;`-delimited search path list, keeping order and skipping
/// empty segments.
pub fn split_search_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(SEARCH_PATH_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Parse one `KEY=VALUE` journal entry.
pub fn parse_entry(entry: &str) -> Result<(String, String), JournalError> {
    match entry.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(JournalError::MalformedEntry(entry.to_string())),
    }
}

/// Read journal data from a JSON object file.
///
/// String values are taken as-is, booleans and numbers as their text, and an
/// array of strings (handy for `SearchPaths`) is joined with `;`.
pub fn read_journal_file(path: &Path) -> Result<HashMap<String, String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read journal file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("journal file {} is not valid JSON", path.display()))?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("journal file {} must contain a JSON object", path.display()))?;

    let mut data = HashMap::new();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| anyhow!("journal key `{key}` must list strings only"))
                })
                .collect::<Result<Vec<_>>>()?
                .join(";"),
            serde_json::Value::Null => continue,
            serde_json::Value::Object(_) => {
                return Err(anyhow!("journal key `{key}` cannot hold a nested object"))
            }
        };
        data.insert(key.clone(), text);
    }
    Ok(data)
}
