//! # History Lens CLI (`hlens`)
//!
//! The `hlens` binary is the primary interface for History Lens. It provides
//! commands for analyzing a browser-history export, exporting the categorized
//! dataset, driving the AI visualization service, and starting the HTTP
//! server.
//!
//! ## Usage
//!
//! ```bash
//! hlens --config ./config/hlens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hlens analyze <file>` | Import an export and print the category breakdown |
//! | `hlens export <file>` | Write the categorized dataset as CSV |
//! | `hlens goals <file>` | Ask the visualization service for analysis goals |
//! | `hlens visualize <file>` | Generate chart artifacts for a goal |
//! | `hlens serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Offline: category breakdown of a Takeout export (JSON or .zip)
//! hlens analyze BrowserHistory.json
//!
//! # Offline: categorized CSV to stdout or a file
//! hlens export BrowserHistory.json --output history.csv
//!
//! # Service-backed: exploratory goals, then charts for a custom query
//! hlens goals BrowserHistory.json --count 3
//! hlens visualize BrowserHistory.json --goal "Visits per category over time"
//!
//! # Serve the session API for a browser client
//! hlens serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use history_lens::{analyze, config, export, server, viz_cmd};

/// History Lens CLI — browser-history analysis with AI-generated
/// visualizations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/hlens.example.toml` for a full example. The offline
/// commands (`analyze`, `export`) run without any configuration.
#[derive(Parser)]
#[command(
    name = "hlens",
    about = "History Lens — browser-history analysis with AI-generated visualizations",
    version,
    long_about = "History Lens imports a browser-history export (Google Takeout JSON or .zip), \
    tags every visited page with a topic category, and delegates natural-language-driven chart \
    generation to an external AI visualization service, exposed via a CLI and a JSON HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/hlens.toml`. Visualization service and server
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/hlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Analyze a history export.
    ///
    /// Imports the export, categorizes every entry, and prints the category
    /// breakdown, date range, and top domains. Runs entirely offline.
    Analyze {
        /// Path to `BrowserHistory.json` or a Takeout `.zip` archive.
        file: PathBuf,
    },

    /// Export the categorized dataset as CSV.
    ///
    /// Produces exactly the tabular rendition the visualization service
    /// receives: `title,url,time,category`, with excluded entries labeled
    /// `unclassified`.
    Export {
        /// Path to `BrowserHistory.json` or a Takeout `.zip` archive.
        file: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Request exploratory analysis goals from the visualization service.
    ///
    /// Summarizes the categorized dataset and prints the goals the service
    /// proposes. Requires `[viz] provider` to be configured.
    Goals {
        /// Path to `BrowserHistory.json` or a Takeout `.zip` archive.
        file: PathBuf,

        /// Number of goals to request (defaults to `viz.goal_count`).
        #[arg(long)]
        count: Option<usize>,
    },

    /// Generate chart artifacts for a goal.
    ///
    /// With `--goal`, visualizes the given natural-language query; without
    /// it, the service's top proposed goal is used. Writes `chart-N.py`
    /// (and `chart-N.png` when the service rendered an image) under the
    /// output directory.
    Visualize {
        /// Path to `BrowserHistory.json` or a Takeout `.zip` archive.
        file: PathBuf,

        /// Natural-language goal to visualize.
        #[arg(long)]
        goal: Option<String>,

        /// Directory for generated artifacts.
        #[arg(long, default_value = "charts")]
        out_dir: PathBuf,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// analysis-session API for browser clients.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Offline commands run without configuration.
    match &cli.command {
        Commands::Analyze { file } => {
            analyze::run_analyze(file)?;
            return Ok(());
        }
        Commands::Export { file, output } => {
            export::run_export(file, output.as_deref())?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Goals { file, count } => {
            viz_cmd::run_goals(&cfg, &file, count).await?;
        }
        Commands::Visualize {
            file,
            goal,
            out_dir,
        } => {
            viz_cmd::run_visualize(&cfg, &file, goal, &out_dir).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze { .. } | Commands::Export { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
