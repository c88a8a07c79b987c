//! # History Lens
//!
//! Browser-history analysis with AI-generated visualizations.
//!
//! History Lens imports a browser-history export (Google Takeout JSON or the
//! Takeout `.zip` archive), tags every visited page with a topic category
//! using an ordered keyword rule table, and delegates natural-language-driven
//! chart generation to an external AI visualization service, exposing results
//! through a CLI and a JSON HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Import    │──▶│  Categorize  │──▶│  CSV dataset   │
//! │ JSON / .zip │   │ rule table   │   │ title,url,...  │
//! └─────────────┘   └──────────────┘   └──────┬────────┘
//!                                             │
//!                         ┌───────────────────┤
//!                         ▼                   ▼
//!                    ┌──────────┐       ┌──────────┐
//!                    │   CLI    │       │   HTTP   │──▶ AI viz service
//!                    │ (hlens)  │       │ sessions │    (summarize/goals/
//!                    └──────────┘       └──────────┘     visualize)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hlens analyze BrowserHistory.json      # category breakdown, offline
//! hlens export BrowserHistory.json       # categorized CSV
//! hlens goals BrowserHistory.json        # service-proposed analysis goals
//! hlens visualize BrowserHistory.json --goal "Visits per category"
//! hlens serve                            # JSON HTTP API for browser clients
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`category`] | Title → category rule table (the classification core) |
//! | [`models`] | History records and datasets |
//! | [`takeout`] | Export import (JSON / Takeout zip) |
//! | [`tabular`] | CSV serialization |
//! | [`viz`] | Visualization service client |
//! | [`analyze`] | Category breakdown and the analyze command |
//! | [`export`] | CSV export command |
//! | [`viz_cmd`] | Goals/visualize commands |
//! | [`config`] | TOML configuration parsing |
//! | [`server`] | Session HTTP server |

pub mod analyze;
pub mod category;
pub mod config;
pub mod export;
pub mod models;
pub mod server;
pub mod tabular;
pub mod takeout;
pub mod viz;
pub mod viz_cmd;
