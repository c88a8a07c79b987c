//! Tabular (CSV) serialization of categorized records.
//!
//! The visualization service consumes datasets as CSV, so this is the wire
//! format for every summarize/visualize call as well as the `hlens export`
//! output. Columns are fixed: `title,url,time,category`. Fields containing
//! commas, quotes, or newlines are quoted with doubled inner quotes;
//! everything else is written bare. Timestamps are `YYYY-MM-DD HH:MM:SS`
//! UTC, empty when the export carried none. Excluded entries appear with
//! the `unclassified` label.

use crate::category;
use crate::models::HistoryRecord;

/// CSV header row.
pub const CSV_HEADER: &str = "title,url,time,category";

/// Serialize records to a CSV document, header first, one row per record,
/// in input order.
pub fn to_csv(records: &[HistoryRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 64 + CSV_HEADER.len() + 1);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for record in records {
        let time = record
            .visited_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        out.push_str(&escape_field(&record.title));
        out.push(',');
        out.push_str(&escape_field(&record.url));
        out.push(',');
        out.push_str(&time);
        out.push(',');
        out.push_str(category::label(record.category));
        out.push('\n');
    }

    out
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
