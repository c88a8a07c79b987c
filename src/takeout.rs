//! Browser-history export import.
//!
//! Parses a Google Takeout browser-history export into categorized
//! [`HistoryRecord`]s. Accepts the raw `BrowserHistory.json` document
//! (either the Takeout `{"Browser History": [...]}` object or a bare entry
//! array) or the Takeout `.zip` archive itself, in which case the history
//! JSON is located inside the archive.
//!
//! Import is a straight parse-and-flatten: entry order is preserved, unknown
//! fields are ignored, and missing `title`/`url` fields default to empty
//! strings so a sparse export never fails the categorizer. Schema problems
//! surface as [`ImportError`], never as panics.

use std::io::Read;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Dataset, HistoryRecord};

/// Maximum decompressed bytes read from a ZIP entry (zip-bomb protection).
const MAX_HISTORY_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// ZIP local-file-header magic.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Import failure. A malformed enclosing dataset is a validation concern of
/// this layer; the categorizer itself never fails.
#[derive(Debug)]
pub enum ImportError {
    /// Payload is neither a ZIP archive nor a JSON document of a known shape.
    UnsupportedPayload(String),
    /// Payload looked like JSON but did not parse.
    Json(String),
    /// ZIP archive could not be read, or an entry exceeded size limits.
    Archive(String),
    /// Archive or JSON object carried no browser-history data.
    MissingHistory,
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::UnsupportedPayload(detail) => {
                write!(f, "unsupported payload: {}", detail)
            }
            ImportError::Json(e) => write!(f, "invalid history JSON: {}", e),
            ImportError::Archive(e) => write!(f, "archive error: {}", e),
            ImportError::MissingHistory => write!(f, "no browser-history data found"),
        }
    }
}

impl std::error::Error for ImportError {}

/// Raw entry as it appears in the export. Only the fields the pipeline
/// consumes are kept; Takeout's extras (favicon, transition, client id)
/// are dropped at the door.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    /// Microseconds since the Unix epoch.
    #[serde(default)]
    time_usec: Option<i64>,
}

/// Parse export bytes into categorized records, preserving input order.
///
/// Detects a ZIP archive by magic number and pulls `BrowserHistory.json`
/// out of it; anything else is treated as the JSON document itself.
pub fn parse_history(bytes: &[u8]) -> Result<Vec<HistoryRecord>, ImportError> {
    if bytes.starts_with(ZIP_MAGIC) {
        let json = read_history_from_zip(bytes)?;
        parse_history_json(&json)
    } else {
        parse_history_json(bytes)
    }
}

/// Parse export bytes and wrap them in a [`Dataset`] named `name`.
pub fn dataset_from_bytes(name: &str, bytes: &[u8]) -> Result<Dataset, ImportError> {
    let records = parse_history(bytes)?;
    Ok(Dataset::new(name, records, bytes))
}

fn parse_history_json(bytes: &[u8]) -> Result<Vec<HistoryRecord>, ImportError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ImportError::Json(e.to_string()))?;

    let raw_entries = match value {
        serde_json::Value::Object(mut map) => map
            .remove("Browser History")
            .ok_or(ImportError::MissingHistory)?,
        array @ serde_json::Value::Array(_) => array,
        other => {
            return Err(ImportError::UnsupportedPayload(format!(
                "expected a JSON object or array, got {}",
                json_type_name(&other)
            )))
        }
    };

    let entries: Vec<RawEntry> =
        serde_json::from_value(raw_entries).map_err(|e| ImportError::Json(e.to_string()))?;

    Ok(entries.into_iter().map(record_from_raw).collect())
}

fn record_from_raw(raw: RawEntry) -> HistoryRecord {
    let visited_at = raw.time_usec.and_then(micros_to_datetime);
    HistoryRecord::new(raw.title, raw.url, visited_at)
}

/// Convert Takeout's microsecond epoch timestamp to UTC. Out-of-range
/// values are dropped rather than failing the whole import.
fn micros_to_datetime(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

/// Locate and read `BrowserHistory.json` inside a Takeout archive.
fn read_history_from_zip(bytes: &[u8]) -> Result<Vec<u8>, ImportError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ImportError::Archive(e.to_string()))?;

    let entry_name = archive
        .file_names()
        .find(|name| name.ends_with("BrowserHistory.json"))
        .map(str::to_string)
        .ok_or(ImportError::MissingHistory)?;

    let entry = archive
        .by_name(&entry_name)
        .map_err(|e| ImportError::Archive(e.to_string()))?;

    let mut out = Vec::new();
    entry
        .take(MAX_HISTORY_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ImportError::Archive(e.to_string()))?;
    if out.len() as u64 >= MAX_HISTORY_ENTRY_BYTES {
        return Err(ImportError::Archive(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            entry_name, MAX_HISTORY_ENTRY_BYTES
        )));
    }

    Ok(out)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
