//! Visualization service provider abstraction and client.
//!
//! Defines the [`VizProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when the service is not configured.
//! - **[`LidaProvider`]** — calls a LIDA-style visualization service over HTTP
//!   with retry and backoff.
//!
//! The service is an opaque collaborator: it receives a tabular dataset and a
//! natural-language goal string and returns a description and/or an
//! image-plus-source-code artifact. Three operations cover the whole
//! interaction:
//!
//! | Operation | Endpoint | Returns |
//! |-----------|----------|---------|
//! | [`summarize_dataset`] | `POST /summarize` | opaque [`DataSummary`] |
//! | [`generate_goals`] | `POST /goals` | exploratory [`Goal`]s |
//! | [`generate_charts`] | `POST /visualize` | [`ChartArtifact`]s |
//!
//! # Credentials
//!
//! The bearer key is an explicit field on [`VizConfig`], threaded into every
//! request. This module never reads or writes the process environment.
//!
//! # Retry Strategy
//!
//! Transient errors are retried with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::VizConfig;
use crate::models::Dataset;
use crate::tabular;

/// Service-defined summary of a dataset. The shape belongs to the service;
/// it is carried opaquely between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSummary(pub serde_json::Value);

/// One exploratory analysis goal proposed by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// The natural-language question the chart should answer.
    pub question: String,
    /// Suggested chart form (e.g. `"bar chart of categories"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// One generated chart: the plotting source code and, when the service
/// rendered it, a base64 PNG raster. Code-only artifacts are valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub library: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster: Option<String>,
}

impl ChartArtifact {
    /// Decode the base64 raster into PNG bytes. `Ok(None)` when the
    /// artifact carries no raster.
    pub fn decode_raster(&self) -> Result<Option<Vec<u8>>> {
        match &self.raster {
            None => Ok(None),
            Some(data) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Invalid raster payload: {}", e))?;
                Ok(Some(bytes))
            }
        }
    }
}

/// Trait for visualization service providers.
///
/// Carries provider metadata; the actual service calls are performed by the
/// free functions below (kept free due to async trait limitations), which
/// dispatch on the config's `provider` field.
pub trait VizProvider: Send + Sync {
    /// Returns the provider identifier (e.g. `"lida"`).
    fn name(&self) -> &str;
    /// Returns the chart library the service targets (e.g. `"seaborn"`).
    fn library(&self) -> &str;
}

/// A no-op provider that always returns errors.
///
/// Used when `viz.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

impl VizProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }
    fn library(&self) -> &str {
        ""
    }
}

/// Provider for a LIDA-style visualization service.
pub struct LidaProvider {
    library: String,
}

impl LidaProvider {
    pub fn new(config: &VizConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("viz.base_url required for the lida provider");
        }
        Ok(Self {
            library: config.library.clone(),
        })
    }
}

impl VizProvider for LidaProvider {
    fn name(&self) -> &str {
        "lida"
    }
    fn library(&self) -> &str {
        &self.library
    }
}

/// Create the appropriate [`VizProvider`] based on configuration.
pub fn create_provider(config: &VizConfig) -> Result<Box<dyn VizProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "lida" => Ok(Box::new(LidaProvider::new(config)?)),
        other => bail!("Unknown visualization provider: {}", other),
    }
}

/// Summarize a dataset: send the CSV rendition, receive the service's
/// opaque summary for use in subsequent goal/chart calls.
pub async fn summarize_dataset(
    _provider: &dyn VizProvider,
    config: &VizConfig,
    dataset: &Dataset,
) -> Result<DataSummary> {
    ensure_enabled(config)?;

    let body = serde_json::json!({
        "name": dataset.name,
        "format": "csv",
        "data": tabular::to_csv(&dataset.records),
    });

    let json = post_with_retry(config, "summarize", &body).await?;
    parse_summary_response(&json)
}

/// Ask the service for `n` exploratory analysis goals over a summary.
pub async fn generate_goals(
    _provider: &dyn VizProvider,
    config: &VizConfig,
    summary: &DataSummary,
    n: usize,
) -> Result<Vec<Goal>> {
    ensure_enabled(config)?;

    let body = serde_json::json!({
        "summary": summary,
        "n": n,
    });

    let json = post_with_retry(config, "goals", &body).await?;
    parse_goals_response(&json)
}

/// Generate chart artifacts for a goal. The goal may come from
/// [`generate_goals`] or be a free-form user query.
pub async fn generate_charts(
    provider: &dyn VizProvider,
    config: &VizConfig,
    summary: &DataSummary,
    goal: &str,
) -> Result<Vec<ChartArtifact>> {
    ensure_enabled(config)?;

    let body = serde_json::json!({
        "summary": summary,
        "goal": goal,
        "library": provider.library(),
        "n": config.chart_count,
        "temperature": config.temperature,
    });

    let json = post_with_retry(config, "visualize", &body).await?;
    parse_charts_response(&json, provider.library())
}

fn ensure_enabled(config: &VizConfig) -> Result<()> {
    match config.provider.as_str() {
        "lida" => Ok(()),
        "disabled" => bail!("Visualization provider is disabled"),
        other => bail!("Unknown visualization provider: {}", other),
    }
}

/// POST a JSON body to the service with retry/backoff.
async fn post_with_retry(
    config: &VizConfig,
    path: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/{}", config.base_url.trim_end_matches('/'), path);

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Visualization service error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("Visualization service error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Visualization request failed after retries")))
}

/// Parse the `POST /summarize` response.
fn parse_summary_response(json: &serde_json::Value) -> Result<DataSummary> {
    let summary = json
        .get("summary")
        .ok_or_else(|| anyhow::anyhow!("Invalid service response: missing summary"))?;
    Ok(DataSummary(summary.clone()))
}

/// Parse the `POST /goals` response. Goal items may be objects or plain
/// question strings.
fn parse_goals_response(json: &serde_json::Value) -> Result<Vec<Goal>> {
    let items = json
        .get("goals")
        .and_then(|g| g.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid service response: missing goals array"))?;

    let mut goals = Vec::with_capacity(items.len());

    for item in items {
        match item {
            serde_json::Value::String(question) => goals.push(Goal {
                question: question.clone(),
                visualization: None,
                rationale: None,
            }),
            serde_json::Value::Object(_) => {
                let goal: Goal = serde_json::from_value(item.clone())
                    .map_err(|e| anyhow::anyhow!("Invalid goal in service response: {}", e))?;
                goals.push(goal);
            }
            other => bail!(
                "Invalid goal in service response: expected object or string, got {}",
                other
            ),
        }
    }

    Ok(goals)
}

/// Parse the `POST /visualize` response. Artifacts missing a library field
/// inherit the requested one.
fn parse_charts_response(json: &serde_json::Value, library: &str) -> Result<Vec<ChartArtifact>> {
    let items = json
        .get("charts")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid service response: missing charts array"))?;

    let mut charts = Vec::with_capacity(items.len());

    for item in items {
        let code = item
            .get("code")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid chart in service response: missing code"))?;

        let chart_library = item
            .get("library")
            .and_then(|l| l.as_str())
            .unwrap_or(library);

        let raster = item
            .get("raster")
            .and_then(|r| r.as_str())
            .map(str::to_string);

        charts.push(ChartArtifact {
            library: chart_library.to_string(),
            code: code.to_string(),
            raster,
        });
    }

    Ok(charts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_disabled() {
        let config = VizConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "disabled");
    }

    #[test]
    fn test_create_provider_lida() {
        let config = VizConfig {
            provider: "lida".to_string(),
            library: "matplotlib".to_string(),
            ..VizConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "lida");
        assert_eq!(provider.library(), "matplotlib");
    }

    #[test]
    fn test_parse_summary_response() {
        let json = serde_json::json!({"summary": {"name": "history", "fields": []}});
        let summary = parse_summary_response(&json).unwrap();
        assert_eq!(summary.0["name"], "history");

        let missing = serde_json::json!({"other": 1});
        assert!(parse_summary_response(&missing).is_err());
    }

    #[test]
    fn test_parse_goals_objects_and_strings() {
        let json = serde_json::json!({
            "goals": [
                {"question": "How do categories split?", "visualization": "bar chart", "rationale": "overview"},
                "What hours see the most visits?"
            ]
        });
        let goals = parse_goals_response(&json).unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].visualization.as_deref(), Some("bar chart"));
        assert_eq!(goals[1].question, "What hours see the most visits?");
        assert!(goals[1].visualization.is_none());
    }

    #[test]
    fn test_parse_goals_rejects_non_goal_items() {
        let json = serde_json::json!({"goals": [42]});
        assert!(parse_goals_response(&json).is_err());
    }

    #[test]
    fn test_parse_charts_inherits_library() {
        let json = serde_json::json!({
            "charts": [
                {"code": "plot()", "raster": "aGVsbG8="},
                {"code": "plot2()", "library": "plotly"}
            ]
        });
        let charts = parse_charts_response(&json, "seaborn").unwrap();
        assert_eq!(charts[0].library, "seaborn");
        assert_eq!(charts[1].library, "plotly");
        assert!(charts[1].raster.is_none());
    }

    #[test]
    fn test_parse_charts_requires_code() {
        let json = serde_json::json!({"charts": [{"raster": "aGVsbG8="}]});
        assert!(parse_charts_response(&json, "seaborn").is_err());
    }

    #[test]
    fn test_decode_raster() {
        let chart = ChartArtifact {
            library: "seaborn".to_string(),
            code: "plot()".to_string(),
            raster: Some("aGVsbG8=".to_string()),
        };
        assert_eq!(chart.decode_raster().unwrap().unwrap(), b"hello");

        let code_only = ChartArtifact {
            library: "seaborn".to_string(),
            code: "plot()".to_string(),
            raster: None,
        };
        assert!(code_only.decode_raster().unwrap().is_none());

        let bad = ChartArtifact {
            library: "seaborn".to_string(),
            code: "plot()".to_string(),
            raster: Some("not base64!!!".to_string()),
        };
        assert!(bad.decode_raster().is_err());
    }
}
