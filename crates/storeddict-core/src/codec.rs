//! YAML codec for the backing file
//!
//! File layout:
//!
//! ```text
//! # Written by StoredDict.
//! # Dictionary contents written: 2026-10-16 09:41:07.120394
//!
//! beamline_id: demo
//! scan_id: 42
//! ```
//!
//! The title line is optional. Everything after the header is a single YAML
//! document whose top level is always a mapping with string keys. Key order
//! in the file follows the insertion order of the cache.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml::Value;
use tracing::debug;

use crate::durability::replace_file;
use crate::error::{StoreError, StoreResult};

/// In-memory form of the file contents.
pub type Mapping = IndexMap<String, Value>;

/// Prefix of the second header line.
pub const WRITTEN_PREFIX: &str = "# Dictionary contents written: ";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Convert a caller value into the YAML value model.
pub fn to_value<T: Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<Value> {
    serde_yaml::to_value(value).map_err(|e| StoreError::NotSerializable {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Check that `{key: value}` survives encoding to YAML text and back.
pub fn check_round_trip(key: &str, value: &Value) -> StoreResult<()> {
    let not_serializable = |reason: String| StoreError::NotSerializable {
        key: key.to_string(),
        reason,
    };

    let mut entry = serde_yaml::Mapping::new();
    entry.insert(Value::String(key.to_string()), value.clone());
    let entry = Value::Mapping(entry);

    let text = serde_yaml::to_string(&entry).map_err(|e| not_serializable(e.to_string()))?;
    let decoded: Value = serde_yaml::from_str(&text).map_err(|e| not_serializable(e.to_string()))?;
    if decoded != entry {
        return Err(not_serializable(format!("value changed after round trip: {}", text.trim_end())));
    }
    Ok(())
}

/// Check that `value` is plain data: mappings, sequences, strings, numbers,
/// booleans and null. YAML tags (how serde encodes enum variants) are rejected
/// at any depth.
pub fn check_plain(key: &str, value: &Value) -> StoreResult<()> {
    match value {
        Value::Tagged(tagged) => Err(StoreError::NotSerializable {
            key: key.to_string(),
            reason: format!("tagged value {} is not plain data", tagged.tag),
        }),
        Value::Sequence(items) => items.iter().try_for_each(|item| check_plain(key, item)),
        Value::Mapping(entries) => entries.iter().try_for_each(|(k, v)| {
            check_plain(key, k)?;
            check_plain(key, v)
        }),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
    }
}

/// Render the full file text: header comments, blank line, YAML body.
pub fn render(
    contents: &Mapping,
    title: Option<&str>,
    written: DateTime<Local>,
) -> Result<String, serde_yaml::Error> {
    let body = serde_yaml::to_string(contents)?;

    let mut text = String::with_capacity(body.len() + 96);
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        text.push_str("# ");
        text.push_str(title);
        text.push('\n');
    }
    text.push_str(WRITTEN_PREFIX);
    text.push_str(&written.format(TIMESTAMP_FORMAT).to_string());
    text.push_str("\n\n");
    text.push_str(&body);
    Ok(text)
}

/// Parse file text into a mapping. Comment-only or blank text is empty.
pub fn parse(text: &str, path: &Path) -> StoreResult<Mapping> {
    let has_payload = text
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'));
    if !has_payload {
        return Ok(Mapping::new());
    }

    let document: Value = serde_yaml::from_str(text).map_err(|e| StoreError::read(path, e))?;
    match document {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(entries) => {
            let mut contents = Mapping::with_capacity(entries.len());
            for (key, value) in entries {
                match key {
                    Value::String(key) => {
                        contents.insert(key, value);
                    }
                    other => {
                        return Err(StoreError::read(
                            path,
                            format!("top-level key {:?} is not a string", other),
                        ));
                    }
                }
            }
            Ok(contents)
        }
        other => Err(StoreError::read(
            path,
            format!("top-level value is {}, expected a mapping", kind_name(&other)),
        )),
    }
}

/// Write `contents` to `path`, replacing any previous snapshot atomically.
pub fn dump(path: &Path, contents: &Mapping, title: Option<&str>, durable: bool) -> StoreResult<()> {
    debug!(path = %path.display(), entries = contents.len(), ?title, "dump");
    let text = render(contents, title, Local::now()).map_err(|e| StoreError::write(path, e))?;
    replace_file(path, text.as_bytes(), durable)
}

/// Read the mapping stored at `path`. A missing or empty file is an empty mapping.
pub fn load(path: &Path) -> StoreResult<Mapping> {
    debug!(path = %path.display(), "load");
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Mapping::new()),
        Err(e) => return Err(StoreError::read(path, e)),
    };
    parse(&text, path)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
