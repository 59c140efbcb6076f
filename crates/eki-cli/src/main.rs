//! EKI CLI - Enterprise Knowledge Intelligence
//!
//! Usage:
//!   eki serve --port 8000                 Start the REST API
//!   eki insight "revenue trends"          Generate an insight
//!   eki forecast revenue --horizon 7      Forecast a metric
//!   eki notebook patch demo.ipynb         Repair broken notebook cells

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port, host } => commands::cmd_serve(config_path, &host, port).await,
        Commands::Notebook { action } => match action {
            NotebookAction::Patch { files, dry_run } => {
                commands::cmd_notebook_patch(&files, dry_run)
            }
            NotebookAction::RewriteModels { files, dry_run } => {
                commands::cmd_notebook_rewrite_models(&files, dry_run)
            }
            NotebookAction::Triggers => commands::cmd_notebook_triggers(),
        },
        Commands::Insight {
            query,
            role,
            audience,
            context,
        } => {
            let orchestrator = commands::open_orchestrator(config_path)?;
            commands::cmd_insight(&orchestrator, &query, &role, audience.as_deref(), &context)
                .await
        }
        Commands::Forecast {
            metric,
            horizon,
            confidence,
        } => {
            let orchestrator = commands::open_orchestrator(config_path)?;
            commands::cmd_forecast(&orchestrator, &metric, horizon, confidence).await
        }
        Commands::Personalized { role, limit } => {
            let orchestrator = commands::open_orchestrator(config_path)?;
            commands::cmd_personalized(&orchestrator, &role, limit).await
        }
        Commands::Dashboard => {
            let orchestrator = commands::open_orchestrator(config_path)?;
            commands::cmd_dashboard(&orchestrator).await
        }
        Commands::Sql { action } => match action {
            SqlAction::ContentAnalysis { days, run } => {
                commands::cmd_sql_content_analysis(config_path, days, run).await
            }
        },
        Commands::Classify {
            titles,
            avg_score,
            post_count,
        } => commands::cmd_classify(&titles, avg_score, post_count),
        Commands::Check => commands::cmd_check(config_path).await,
    }
}
