//! Configuration and connectivity check

use std::path::Path;

use anyhow::Result;
use eki_core::KnowledgeEngine;

use super::open_orchestrator;

pub async fn cmd_check(config_path: Option<&Path>) -> Result<()> {
    println!("🔍 Checking EKI configuration...\n");

    let orchestrator = open_orchestrator(config_path)?;
    let config = orchestrator.config();

    println!("  Project: {}", config.project_id);
    println!("  Dataset: {}", config.dataset);
    println!(
        "  Retrieval: top {} above {:.2} similarity",
        config.top_k, config.similarity_threshold
    );
    println!(
        "  Windows: personalization {} day(s), dashboard {} hour(s)",
        config.personalization_window_days, config.dashboard_window_hours
    );
    println!(
        "  Requests: {}s timeout, {} retr(y/ies)",
        config.request_timeout.as_secs(),
        config.max_retries
    );
    println!();

    print!("Checking {} engine... ", orchestrator.engine().name());
    if orchestrator.health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  The knowledge engine did not answer a trivial query.");
        println!("\nTo set up BigQuery:");
        println!("  1. export BIGQUERY_PROJECT=<your project id>");
        println!("  2. export BIGQUERY_ACCESS_TOKEN=$(gcloud auth print-access-token)");
        println!("  3. Run again: eki check");
    }
    Ok(())
}
