//! Insight, forecast and dashboard command implementations

use anyhow::Result;
use eki_core::{CallerIdentity, Error, ForecastRequest, InsightOrchestrator, InsightRequest};

use super::{parse_context, truncate};

/// Identity used for commands run from the terminal
fn cli_caller(role: &str) -> CallerIdentity {
    let user = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
    CallerIdentity::new(&user, role)
}

pub async fn cmd_insight(
    orchestrator: &InsightOrchestrator,
    query: &str,
    role: &str,
    audience: Option<&str>,
    context: &[String],
) -> Result<()> {
    let context = parse_context(context)?;
    let request = InsightRequest {
        query: query.to_string(),
        user_role: audience.map(str::to_string),
        context: if context.is_empty() {
            None
        } else {
            Some(context)
        },
    };

    println!("🔍 Searching knowledge base as '{}'...", role);

    let insight = match orchestrator
        .generate_insight(&request, &cli_caller(role))
        .await
    {
        Ok(insight) => insight,
        Err(Error::NotFound(msg)) => {
            println!("   {}", msg);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!();
    println!("💡 {}", insight.content);
    println!();
    println!(
        "   Confidence: {:.2}  Impact: {:.2}",
        insight.confidence_score, insight.business_impact_score
    );
    println!("   Sources: {}", insight.sources.join(", "));
    println!("   Insight ID: {}", insight.insight_id);
    Ok(())
}

pub async fn cmd_forecast(
    orchestrator: &InsightOrchestrator,
    metric: &str,
    horizon_days: u32,
    confidence_level: f64,
) -> Result<()> {
    let request = ForecastRequest {
        metric_name: metric.to_string(),
        horizon_days,
        confidence_level,
    };

    println!(
        "📈 Forecasting '{}' for {} day(s) at {:.0}% confidence...",
        metric,
        horizon_days,
        confidence_level * 100.0
    );

    let forecast = match orchestrator
        .generate_forecast(&request, &cli_caller("analyst"))
        .await
    {
        Ok(forecast) => forecast,
        Err(Error::NotFound(msg)) => {
            println!("   {}", msg);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!();
    println!("   {:<12} {:>12} {:>12} {:>12}", "Date", "Value", "Lower", "Upper");
    for (point, interval) in forecast
        .forecast_values
        .iter()
        .zip(&forecast.confidence_intervals)
    {
        println!(
            "   {:<12} {:>12.2} {:>12.2} {:>12.2}",
            point.timestamp.format("%Y-%m-%d"),
            point.value,
            interval.lower,
            interval.upper
        );
    }
    println!();
    println!("🧭 {}", forecast.strategic_recommendations);
    Ok(())
}

pub async fn cmd_personalized(
    orchestrator: &InsightOrchestrator,
    role: &str,
    limit: usize,
) -> Result<()> {
    let result = orchestrator
        .list_personalized_insights(&cli_caller(role), limit)
        .await?;

    if result.insights.is_empty() {
        println!("No recent insights for role '{}'", role);
        return Ok(());
    }

    println!("🎯 {} insight(s) for '{}':", result.total_count, role);
    println!();
    for insight in &result.insights {
        println!(
            "   [{:.2} relevance, {:.2} impact] {}",
            insight.relevance_score,
            insight.business_impact_score,
            truncate(&insight.content, 70)
        );
    }
    Ok(())
}

pub async fn cmd_dashboard(orchestrator: &InsightOrchestrator) -> Result<()> {
    let snapshot = orchestrator
        .get_dashboard_snapshot(&cli_caller("analyst"))
        .await?;

    println!("📊 Today");
    if snapshot.metrics.is_empty() {
        println!("   (no metrics yet)");
    }
    for metric in &snapshot.metrics {
        println!("   {:<24} {:>10.2}", metric.metric_name, metric.metric_value);
    }

    println!();
    println!("🔥 Top insights (last 24h)");
    if snapshot.recent_insights.is_empty() {
        println!("   (none)");
    }
    for insight in &snapshot.recent_insights {
        println!(
            "   {:.2}  {}  {}",
            insight.business_impact_score,
            insight.generated_timestamp.format("%Y-%m-%d %H:%M"),
            truncate(&insight.content, 60)
        );
    }
    Ok(())
}
