use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub viz: VizConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Visualization service settings.
///
/// The credential is an explicit configuration value handed to the service
/// client; the process environment is only consulted (read-only) at load
/// time when the config file carries no key.
#[derive(Debug, Deserialize, Clone)]
pub struct VizConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Chart library the service should target (e.g. `seaborn`, `matplotlib`).
    #[serde(default = "default_library")]
    pub library: String,
    /// Number of exploratory goals to request.
    #[serde(default = "default_goal_count")]
    pub goal_count: usize,
    /// Number of chart candidates to request per goal.
    #[serde(default = "default_chart_count")]
    pub chart_count: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key: None,
            library: default_library(),
            goal_count: default_goal_count(),
            chart_count: default_chart_count(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "http://127.0.0.1:8570".to_string()
}
fn default_library() -> String {
    "seaborn".to_string()
}
fn default_goal_count() -> usize {
    1
}
fn default_chart_count() -> usize {
    1
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7420".to_string()
}

impl VizConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Minimal config for commands that need no service or server settings
    /// (defaults everywhere, provider disabled).
    pub fn minimal() -> Self {
        Self {
            viz: VizConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Resolve the service credential: config value wins, environment is a
    // read-only fallback. Nothing is ever written back to the environment.
    if config.viz.api_key.is_none() {
        config.viz.api_key = std::env::var("HLENS_API_KEY").ok();
    }

    // Validate visualization settings
    match config.viz.provider.as_str() {
        "disabled" | "lida" => {}
        other => anyhow::bail!(
            "Unknown visualization provider: '{}'. Must be disabled or lida.",
            other
        ),
    }

    if config.viz.is_enabled() {
        if config.viz.base_url.trim().is_empty() {
            anyhow::bail!(
                "viz.base_url must be set when provider is '{}'",
                config.viz.provider
            );
        }
        if config.viz.goal_count == 0 {
            anyhow::bail!("viz.goal_count must be >= 1");
        }
        if config.viz.chart_count == 0 {
            anyhow::bail!("viz.chart_count must be >= 1");
        }
        if !(0.0..=2.0).contains(&config.viz.temperature) {
            anyhow::bail!("viz.temperature must be in [0.0, 2.0]");
        }
        if config.viz.timeout_secs == 0 {
            anyhow::bail!("viz.timeout_secs must be > 0");
        }
    }

    // Validate server settings
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.viz.provider, "disabled");
        assert!(!config.viz.is_enabled());
        assert_eq!(config.viz.library, "seaborn");
        assert_eq!(config.server.bind, "127.0.0.1:7420");
    }

    #[test]
    fn test_enabled_provider_parses() {
        let file = write_config(
            r#"
[viz]
provider = "lida"
base_url = "http://127.0.0.1:9000"
api_key = "sk-test"
goal_count = 3
temperature = 0.7
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert!(config.viz.is_enabled());
        assert_eq!(config.viz.goal_count, 3);
        assert_eq!(config.viz.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let file = write_config("[viz]\nprovider = \"other\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_zero_goal_count_rejected() {
        let file = write_config("[viz]\nprovider = \"lida\"\ngoal_count = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let file = write_config("[viz]\nprovider = \"lida\"\ntemperature = 3.5\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_empty_bind_rejected() {
        let file = write_config("[server]\nbind = \"\"\n");
        assert!(load_config(file.path()).is_err());
    }
}
