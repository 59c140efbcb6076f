//! Insight and forecast orchestration
//!
//! Turns validated requests into engine round trips and maps the rows back
//! into response records. Engine failures are logged here with the
//! operation and caller, then replaced by a caller-safe
//! [`Error::OperationFailed`]; validation and not-found outcomes pass
//! through untouched.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::rows::Row;
use crate::engine::{EngineClient, KnowledgeEngine};
use crate::error::{Error, Result};
use crate::models::{
    Acknowledgement, CallerIdentity, ConfidenceInterval, DashboardSnapshot, ForecastPoint,
    ForecastRequest, ForecastResponse, ForecastRow, InsightRequest, InsightResponse,
    PersonalizedInsight, PersonalizedInsights, SearchHit, UserPreferences,
};
use crate::sql::ParameterizedQuery;

const INSIGHT_FAILED: &str = "Failed to generate insight";
const FORECAST_FAILED: &str = "Failed to generate forecast";
const PERSONALIZED_FAILED: &str = "Failed to fetch personalized insights";
const DASHBOARD_FAILED: &str = "Failed to fetch dashboard data";
const PREFERENCES_FAILED: &str = "Failed to update user preferences";

pub const PREFERENCES_UPDATED: &str = "User preferences updated successfully";

/// Entry point for every insight operation
///
/// Cheap to clone: the engine handle and config are shared.
#[derive(Clone)]
pub struct InsightOrchestrator {
    engine: EngineClient,
    config: Arc<EngineConfig>,
}

impl InsightOrchestrator {
    pub fn new(engine: EngineClient, config: EngineConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &EngineClient {
        &self.engine
    }

    /// Check that the engine is reachable within the request timeout
    pub async fn health_check(&self) -> bool {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.engine.health_check()).await {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Engine health check timed out");
                false
            }
        }
    }

    /// Run a raw analytical query under the request timeout and retry policy
    ///
    /// Only the BigQuery engine executes SQL.
    pub async fn run_query(&self, query: &ParameterizedQuery) -> Result<Vec<Row>> {
        match &self.engine {
            EngineClient::BigQuery(backend) => self.call("run_query", || backend.run(query)).await,
            EngineClient::Mock(_) => Err(Error::Config(
                "raw queries need the bigquery engine (EKI_ENGINE=bigquery)".into(),
            )),
        }
    }

    /// Run one engine call under the request timeout, retrying transport
    /// failures up to `max_retries` times
    async fn call<T, F, Fut>(&self, step: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.request_timeout;
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(timeout.as_secs())),
            };
            match outcome {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(step, attempt, error = %e, "Engine call failed, retrying");
                }
                other => return other,
            }
        }
    }

    /// Retrieve relevant knowledge and generate an insight from it
    pub async fn generate_insight(
        &self,
        request: &InsightRequest,
        caller: &CallerIdentity,
    ) -> Result<InsightResponse> {
        request.validate()?;
        self.generate_insight_inner(request, caller)
            .await
            .map_err(|e| {
                conceal("generate_insight", INSIGHT_FAILED, caller, e, || {
                    format!("query={:?}", request.query)
                })
            })
    }

    async fn generate_insight_inner(
        &self,
        request: &InsightRequest,
        caller: &CallerIdentity,
    ) -> Result<InsightResponse> {
        let embedding = self.call("embed", || self.engine.embed(&request.query)).await?;
        let hits = self
            .call("search", || {
                self.engine.search(&embedding, self.config.top_k, &caller.role)
            })
            .await?;

        let relevant = above_threshold(hits, self.config.similarity_threshold);
        if relevant.is_empty() {
            info!(user_id = %caller.user_id, role = %caller.role, "No knowledge above similarity threshold");
            return Err(Error::NotFound("No relevant insights found".into()));
        }
        debug!(hits = relevant.len(), "Retrieved knowledge for insight");

        let prompt = insight_prompt(request, &relevant);
        let content = self.call("generate", || self.engine.generate(&prompt)).await?;

        Ok(InsightResponse {
            insight_id: uuid::Uuid::new_v4().to_string(),
            content,
            confidence_score: self.config.default_confidence_score,
            business_impact_score: self.config.default_business_impact_score,
            generated_timestamp: Utc::now(),
            sources: relevant.into_iter().map(|h| h.knowledge_id).collect(),
        })
    }

    /// Forecast a metric and ask for a strategic reading of the series
    pub async fn generate_forecast(
        &self,
        request: &ForecastRequest,
        caller: &CallerIdentity,
    ) -> Result<ForecastResponse> {
        request.validate(self.config.max_horizon_days)?;
        self.generate_forecast_inner(request).await.map_err(|e| {
            conceal("generate_forecast", FORECAST_FAILED, caller, e, || {
                format!("metric={}", request.metric_name)
            })
        })
    }

    async fn generate_forecast_inner(&self, request: &ForecastRequest) -> Result<ForecastResponse> {
        let rows = self
            .call("forecast", || {
                self.engine.forecast(
                    &request.metric_name,
                    request.horizon_days,
                    request.confidence_level,
                )
            })
            .await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!(
                "No forecast available for metric {}",
                request.metric_name
            )));
        }

        let prompt = forecast_prompt(&request.metric_name, &rows);
        let strategic_recommendations =
            self.call("generate", || self.engine.generate(&prompt)).await?;

        let (forecast_values, confidence_intervals) = rows
            .iter()
            .map(|row| {
                (
                    ForecastPoint {
                        timestamp: row.timestamp,
                        value: row.value,
                    },
                    ConfidenceInterval {
                        timestamp: row.timestamp,
                        lower: row.lower,
                        upper: row.upper,
                    },
                )
            })
            .unzip();

        Ok(ForecastResponse {
            metric_name: request.metric_name.clone(),
            forecast_values,
            confidence_intervals,
            strategic_recommendations,
        })
    }

    /// Recent insights for the caller's role, most relevant first
    pub async fn list_personalized_insights(
        &self,
        caller: &CallerIdentity,
        limit: usize,
    ) -> Result<PersonalizedInsights> {
        if limit == 0 || limit > self.config.max_personalized_limit {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                self.config.max_personalized_limit
            )));
        }

        let fetched = self
            .call("personalized_insights", || {
                self.engine.personalized_insights(
                    &caller.role,
                    self.config.personalization_window_days,
                    limit,
                )
            })
            .await
            .map_err(|e| {
                conceal("list_personalized_insights", PERSONALIZED_FAILED, caller, e, || {
                    format!("limit={}", limit)
                })
            })?;

        let insights = rank_personalized(fetched, limit);
        Ok(PersonalizedInsights {
            total_count: insights.len(),
            insights,
        })
    }

    /// Today's counters plus the top recent insights
    pub async fn get_dashboard_snapshot(&self, caller: &CallerIdentity) -> Result<DashboardSnapshot> {
        let metrics = self.call("daily_metrics", || self.engine.daily_metrics());
        let recent = self.call("recent_top_insights", || {
            self.engine.recent_top_insights(
                self.config.dashboard_window_hours,
                self.config.dashboard_recent_limit,
            )
        });

        let (metrics, recent_insights) = tokio::try_join!(metrics, recent).map_err(|e| {
            conceal("get_dashboard_snapshot", DASHBOARD_FAILED, caller, e, String::new)
        })?;

        Ok(DashboardSnapshot {
            metrics,
            recent_insights,
        })
    }

    /// Store the caller's preferences, replacing any existing record
    pub async fn update_user_preferences(
        &self,
        preferences: &UserPreferences,
        caller: &CallerIdentity,
    ) -> Result<Acknowledgement> {
        preferences.validate()?;
        if preferences.user_id != caller.user_id {
            warn!(
                user_id = %caller.user_id,
                target_user = %preferences.user_id,
                "Rejected preferences update for another user"
            );
            return Err(Error::Forbidden(
                "preferences can only be updated for the authenticated user".into(),
            ));
        }
        self.call("upsert_preferences", || {
            self.engine.upsert_preferences(preferences)
        })
        .await
        .map_err(|e| {
            conceal("update_user_preferences", PREFERENCES_FAILED, caller, e, || {
                format!("target_user={}", preferences.user_id)
            })
        })?;

        info!(user_id = %preferences.user_id, "Updated user preferences");
        Ok(Acknowledgement {
            message: PREFERENCES_UPDATED.to_string(),
        })
    }
}

/// Log an engine failure and replace it with a caller-safe error
fn conceal(
    operation: &'static str,
    message: &'static str,
    caller: &CallerIdentity,
    err: Error,
    detail: impl FnOnce() -> String,
) -> Error {
    match err {
        Error::Validation(_) | Error::NotFound(_) | Error::Forbidden(_) => err,
        other => {
            error!(
                operation,
                user_id = %caller.user_id,
                role = %caller.role,
                detail = %detail(),
                error = %other,
                "Engine operation failed"
            );
            Error::OperationFailed(message)
        }
    }
}

/// Keep hits strictly above the threshold, preserving engine order
fn above_threshold(hits: Vec<SearchHit>, threshold: f64) -> Vec<SearchHit> {
    hits.into_iter().filter(|h| h.similarity > threshold).collect()
}

fn insight_prompt(request: &InsightRequest, hits: &[SearchHit]) -> String {
    let context = hits
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    let mut prompt = format!(
        "Generate actionable business insight for: {} Based on context: {}",
        request.query, context
    );
    if let Some(role) = &request.user_role {
        prompt.push_str(&format!(" Audience role: {}", role));
    }
    if let Some(extra) = request.context.as_ref().filter(|c| !c.is_empty()) {
        prompt.push_str(" Additional context: ");
        prompt.push_str(&format_context(extra));
    }
    prompt
}

fn format_context(context: &BTreeMap<String, serde_json::Value>) -> String {
    context
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn forecast_prompt(metric_name: &str, rows: &[ForecastRow]) -> String {
    let series = rows
        .iter()
        .map(|r| format!("Date: {}, Value: {}", r.timestamp.format("%Y-%m-%d"), r.value))
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "Analyze forecast trends and provide strategic recommendations for metric: {} Forecast data: {}",
        metric_name, series
    )
}

/// Non-finite scores rank as zero
fn finite_or_zero(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Sort by relevance then business impact, both descending, and truncate
fn rank_personalized(mut insights: Vec<PersonalizedInsight>, limit: usize) -> Vec<PersonalizedInsight> {
    for insight in &mut insights {
        insight.relevance_score = finite_or_zero(insight.relevance_score);
        insight.business_impact_score = finite_or_zero(insight.business_impact_score);
    }
    insights.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| b.business_impact_score.total_cmp(&a.business_impact_score))
    });
    insights.truncate(limit);
    insights
}
