//! Analytical SQL and classification command implementations

use std::path::Path;

use anyhow::{bail, Context, Result};
use eki_core::classify::{classify_title, market_potential, performance_tier};
use eki_core::sql::{self, ParamValue};
use eki_core::InsightOrchestrator;

use super::open_orchestrator;

pub async fn cmd_sql_content_analysis(
    config_path: Option<&Path>,
    days: u32,
    run: bool,
) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let query = sql::content_analysis(days);

    if !run {
        println!("{};", query.sql);
        println!();
        for param in &query.params {
            println!("-- @{} = {}", param.name, format_param(&param.value));
        }
        return Ok(());
    }

    let orchestrator = open_orchestrator(config_path)?;
    run_content_analysis(&orchestrator, days).await
}

/// Execute the content-analysis query and print one line per category
pub async fn run_content_analysis(orchestrator: &InsightOrchestrator, days: u32) -> Result<()> {
    let query = sql::content_analysis(days);

    println!("📊 Running content analysis over the last {} day(s)...", days);
    let rows = orchestrator
        .run_query(&query)
        .await
        .context("Content analysis query failed")?;

    println!();
    println!(
        "   {:<12} {:>8} {:>10} {:<20} {}",
        "Category", "Posts", "Avg score", "Performance", "Potential"
    );
    for row in &rows {
        println!(
            "   {:<12} {:>8} {:>10.1} {:<20} {}",
            row.get_str("content_category")?,
            row.get_str("post_count")?,
            row.get_f64("avg_score")?,
            row.get_str("performance_tier")?,
            row.get_str("market_potential")?
        );
    }
    println!();
    println!("Analyzed {} content categories", rows.len());
    Ok(())
}

fn format_param(value: &ParamValue) -> String {
    match value {
        ParamValue::String(s) | ParamValue::Json(s) => format!("{:?}", s),
        ParamValue::Int64(n) => n.to_string(),
        ParamValue::Float64(f) => f.to_string(),
        ParamValue::StringArray(items) => format!("{:?}", items),
        ParamValue::FloatArray(items) => format!("{:?}", items),
    }
}

pub fn cmd_classify(titles: &[String], avg_score: Option<f64>, post_count: Option<u64>) -> Result<()> {
    for title in titles {
        println!("{:<12} {}", classify_title(title).as_str(), title);
    }

    if let Some(score) = avg_score {
        println!();
        println!("Performance tier: {}", performance_tier(score).as_str());
        if let Some(count) = post_count {
            println!("Market potential: {}", market_potential(count, score).as_str());
        }
    }
    Ok(())
}
