//! Export a categorized dataset as CSV.
//!
//! Produces the same tabular rendition the visualization service consumes,
//! so users can inspect exactly what would be sent, or feed the categorized
//! history into their own tooling.

use anyhow::{Context, Result};
use std::path::Path;

use crate::tabular;
use crate::takeout;

/// Import the export at `input`, categorize it, and write CSV.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(input: &Path, output: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read history export: {}", input.display()))?;
    let records = takeout::parse_history(&bytes)
        .with_context(|| format!("Failed to import {}", input.display()))?;

    let csv = tabular::to_csv(&records);

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &csv)?;
            eprintln!(
                "Exported {} records to {}",
                records.len(),
                path.display()
            );
        }
        None => {
            print!("{}", csv);
        }
    }

    Ok(())
}
