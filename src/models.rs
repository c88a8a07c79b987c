//! Core data models.
//!
//! These types represent the history records and datasets that flow through
//! the import, analysis, and visualization pipeline.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::category::{self, Category};

/// One visited-page record from a browser-history export.
///
/// The category is computed once from the title when the record is built and
/// is never recomputed afterward. `category == None` marks an excluded entry
/// ("new tab"), serialized as the `"unclassified"` sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub title: String,
    pub url: String,
    /// Visit time in UTC. Exports may omit the timestamp.
    pub visited_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_category")]
    pub category: Option<Category>,
}

impl HistoryRecord {
    /// Build a record, attaching the category derived from `title`.
    pub fn new(title: String, url: String, visited_at: Option<DateTime<Utc>>) -> Self {
        let category = category::categorize(&title);
        Self {
            title,
            url,
            visited_at,
            category,
        }
    }
}

fn serialize_category<S: Serializer>(
    category: &Option<Category>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(category::label(*category))
}

/// One analysis session's worth of categorized records.
///
/// Datasets are transient: they live in memory for the duration of a session
/// and are never persisted. The fingerprint identifies the uploaded source
/// bytes so repeated uploads of the same export are recognizable.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Display name, typically derived from the source file name.
    pub name: String,
    pub records: Vec<HistoryRecord>,
    /// Hex SHA-256 of the raw uploaded bytes.
    pub fingerprint: String,
}

impl Dataset {
    /// Build a dataset from already-categorized records, fingerprinting the
    /// source bytes they were parsed from.
    pub fn new(name: impl Into<String>, records: Vec<HistoryRecord>, source: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source);
        let fingerprint = format!("{:x}", hasher.finalize());

        Self {
            name: name.into(),
            records,
            fingerprint,
        }
    }

    /// Total record count, including excluded entries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of records excluded from categorization ("new tab" entries).
    pub fn unclassified_count(&self) -> usize {
        self.records.iter().filter(|r| r.category.is_none()).count()
    }

    /// Count of records carrying a category.
    pub fn classified_count(&self) -> usize {
        self.records.len() - self.unclassified_count()
    }
}
