//! The `hlens goals` and `hlens visualize` commands.
//!
//! Thin command wrappers over the service client: import and categorize the
//! export, summarize it, then either print the proposed analysis goals or
//! generate chart artifacts and write them to disk.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::models::Dataset;
use crate::takeout;
use crate::viz;

/// Request exploratory goals for a history export and print them.
pub async fn run_goals(config: &Config, input: &Path, count: Option<usize>) -> Result<()> {
    if !config.viz.is_enabled() {
        bail!("Visualization provider is disabled. Set [viz] provider in config.");
    }

    let dataset = load_dataset(input)?;
    let provider = viz::create_provider(&config.viz)?;
    let n = count.unwrap_or(config.viz.goal_count);

    let summary = viz::summarize_dataset(provider.as_ref(), &config.viz, &dataset).await?;
    let goals = viz::generate_goals(provider.as_ref(), &config.viz, &summary, n).await?;

    println!("goals {}", dataset.name);
    println!(
        "  entries: {} ({} excluded)",
        dataset.len(),
        dataset.unclassified_count()
    );
    for (i, goal) in goals.iter().enumerate() {
        println!("  Goal {}: {}", i + 1, goal.question);
        if let Some(chart) = &goal.visualization {
            println!("          chart: {}", chart);
        }
        if let Some(rationale) = &goal.rationale {
            println!("          rationale: {}", rationale);
        }
    }
    println!("ok");

    Ok(())
}

/// Generate chart artifacts for a goal and write them under `out_dir`.
///
/// When `goal` is `None`, the service's top proposed goal is used. Each
/// artifact yields a `chart-N.py` source file and, when the service
/// rendered a raster, a `chart-N.png` next to it.
pub async fn run_visualize(
    config: &Config,
    input: &Path,
    goal: Option<String>,
    out_dir: &Path,
) -> Result<()> {
    if !config.viz.is_enabled() {
        bail!("Visualization provider is disabled. Set [viz] provider in config.");
    }

    let dataset = load_dataset(input)?;
    let provider = viz::create_provider(&config.viz)?;

    let summary = viz::summarize_dataset(provider.as_ref(), &config.viz, &dataset).await?;

    let goal_text = match goal {
        Some(text) => text,
        None => {
            let goals = viz::generate_goals(provider.as_ref(), &config.viz, &summary, 1).await?;
            goals
                .into_iter()
                .next()
                .map(|g| g.question)
                .ok_or_else(|| anyhow::anyhow!("Service proposed no goals for this dataset"))?
        }
    };

    let charts = viz::generate_charts(provider.as_ref(), &config.viz, &summary, &goal_text).await?;

    if charts.is_empty() {
        bail!("No visualization generated for the goal");
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    println!("visualize {}", dataset.name);
    println!("  goal: {}", goal_text);
    println!("  charts: {}", charts.len());

    for (i, chart) in charts.iter().enumerate() {
        let stem = format!("chart-{}", i + 1);

        if let Some(png) = chart.decode_raster()? {
            let png_path = out_dir.join(format!("{}.png", stem));
            std::fs::write(&png_path, png)?;
            println!("  wrote {}", png_path.display());
        }

        let code_path = out_dir.join(format!("{}.py", stem));
        std::fs::write(&code_path, &chart.code)?;
        println!("  wrote {}", code_path.display());
    }
    println!("ok");

    Ok(())
}

fn load_dataset(input: &Path) -> Result<Dataset> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read history export: {}", input.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "history".to_string());
    takeout::dataset_from_bytes(&name, &bytes)
        .with_context(|| format!("Failed to import {}", input.display()))
}
