//! Dataset analysis and the `hlens analyze` command.
//!
//! Aggregates categorized records into a per-category breakdown, a visit
//! date range, and a top-domains list, and prints a summary table. Gives
//! confidence that an export parsed the way the user expects before any
//! service call is made. Runs entirely offline.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::category::{self, Category, ALL_CATEGORIES};
use crate::models::{Dataset, HistoryRecord};
use crate::takeout;

/// One category's slice of the classified entries.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: usize,
    /// Share of *classified* entries, 0–100.
    pub percent: f64,
}

/// Per-category aggregation of a dataset.
///
/// Excluded ("new tab") entries are tallied separately and do not
/// participate in the category shares, per the categorizer contract.
#[derive(Debug, Clone, Serialize)]
pub struct Breakdown {
    pub total: usize,
    pub classified: usize,
    pub unclassified: usize,
    /// All categories in fixed order, zero counts included.
    pub categories: Vec<CategoryShare>,
}

/// Aggregate records into a [`Breakdown`]. Order-independent over the
/// input; output order is the fixed category order.
pub fn breakdown(records: &[HistoryRecord]) -> Breakdown {
    let mut counts: HashMap<Category, usize> = HashMap::new();
    let mut unclassified = 0usize;

    for record in records {
        match record.category {
            Some(category) => *counts.entry(category).or_insert(0) += 1,
            None => unclassified += 1,
        }
    }

    let classified = records.len() - unclassified;

    let categories = ALL_CATEGORIES
        .iter()
        .map(|category| {
            let count = counts.get(category).copied().unwrap_or(0);
            let percent = if classified > 0 {
                count as f64 * 100.0 / classified as f64
            } else {
                0.0
            };
            CategoryShare {
                category: category.as_str().to_string(),
                count,
                percent,
            }
        })
        .collect();

    Breakdown {
        total: records.len(),
        classified,
        unclassified,
        categories,
    }
}

/// Earliest and latest visit time, when any record carries one.
pub fn date_range(records: &[HistoryRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut times = records.iter().filter_map(|r| r.visited_at);
    let first = times.next()?;
    let (min, max) = times.fold((first, first), |(min, max), t| (min.min(t), max.max(t)));
    Some((min, max))
}

/// Most-visited domains, descending by count (ties broken by name for
/// stable output). Records without a parseable host are skipped.
pub fn top_domains(records: &[HistoryRecord], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let domain = extract_domain(&record.url);
        if domain.is_empty() {
            continue;
        }
        *counts.entry(domain).or_insert(0) += 1;
    }

    let mut domains: Vec<(String, usize)> = counts.into_iter().collect();
    domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    domains.truncate(limit);
    domains
}

fn extract_domain(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split('/').next().unwrap_or("").to_lowercase()
}

/// Run the analyze command: import the export and print a summary.
pub fn run_analyze(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read history export: {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "history".to_string());

    let dataset = takeout::dataset_from_bytes(&name, &bytes)
        .with_context(|| format!("Failed to import {}", path.display()))?;

    print_analysis(&dataset);
    Ok(())
}

fn print_analysis(dataset: &Dataset) {
    let summary = breakdown(&dataset.records);

    println!("History Lens — Dataset Analysis");
    println!("===============================");
    println!();
    println!("  Dataset:      {}", dataset.name);
    println!("  Fingerprint:  {}", &dataset.fingerprint[..12]);
    println!("  Entries:      {}", summary.total);
    println!("  Classified:   {}", summary.classified);
    println!(
        "  Excluded:     {} ({})",
        summary.unclassified,
        category::UNCLASSIFIED_LABEL
    );

    if let Some((from, to)) = date_range(&dataset.records) {
        println!(
            "  Date range:   {} — {}",
            from.format("%Y-%m-%d %H:%M"),
            to.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("  By category:");
    println!("  {:<16} {:>8} {:>8}", "CATEGORY", "COUNT", "SHARE");
    println!("  {}", "-".repeat(34));
    for share in &summary.categories {
        println!(
            "  {:<16} {:>8} {:>7.1}%",
            share.category, share.count, share.percent
        );
    }

    let domains = top_domains(&dataset.records, 5);
    if !domains.is_empty() {
        println!();
        println!("  Top domains:");
        for (domain, count) in &domains {
            println!("  {:<32} {:>6}", domain, count);
        }
    }

    println!();
}
