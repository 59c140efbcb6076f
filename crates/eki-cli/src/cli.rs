//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// EKI - Enterprise Knowledge Intelligence
#[derive(Parser)]
#[command(name = "eki")]
#[command(about = "Warehouse-backed insights, forecasts and notebook repair", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config override file (defaults to EKI_CONFIG, then ~/.config/eki/engine.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Repair notebooks (patch broken cells, rewrite model references)
    Notebook {
        #[command(subcommand)]
        action: NotebookAction,
    },

    /// Generate an insight for a natural-language question
    Insight {
        /// The question to answer
        query: String,

        /// Caller role used for access control on knowledge records
        #[arg(long, default_value = "analyst")]
        role: String,

        /// Audience role mentioned in the generation prompt
        #[arg(long)]
        audience: Option<String>,

        /// Extra context as key=value (repeatable)
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },

    /// Forecast a metric and ask for strategic recommendations
    Forecast {
        /// Metric name (selects the forecast_model_<metric> model)
        metric: String,

        /// Days to forecast
        #[arg(long, default_value = "30")]
        horizon: u32,

        /// Prediction interval confidence level
        #[arg(long, default_value = "0.95")]
        confidence: f64,
    },

    /// List recent insights targeted at a role
    Personalized {
        /// Caller role
        #[arg(long, default_value = "analyst")]
        role: String,

        /// Maximum number of insights
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show today's counters and the top recent insights
    Dashboard,

    /// Print (or run) analytical SQL
    Sql {
        #[command(subcommand)]
        action: SqlAction,
    },

    /// Classify post titles into content categories
    Classify {
        /// Titles to classify
        #[arg(required = true)]
        titles: Vec<String>,

        /// Average score, to also report the performance tier
        #[arg(long)]
        avg_score: Option<f64>,

        /// Post count, to also report the market potential (needs --avg-score)
        #[arg(long, requires = "avg_score")]
        post_count: Option<u64>,
    },

    /// Check configuration and engine connectivity
    Check,
}

#[derive(Subcommand)]
pub enum NotebookAction {
    /// Replace cells matching the trigger table with corrected templates
    Patch {
        /// Notebook files to patch in place
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Rewrite `AI.GENERATE*(MODEL `x`` references to `AI.GENERATE*(x`
    RewriteModels {
        /// Notebook files to rewrite in place
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the trigger table in priority order
    Triggers,
}

#[derive(Subcommand)]
pub enum SqlAction {
    /// Content category engagement statistics over Hacker News stories
    ContentAnalysis {
        /// Look-back window in days
        #[arg(long, default_value = "30")]
        days: u32,

        /// Execute against BigQuery instead of printing the SQL
        #[arg(long)]
        run: bool,
    },
}
