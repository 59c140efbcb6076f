//! Knowledge engine abstraction
//!
//! Retrieval, generation, forecasting and insight storage all happen in an
//! external warehouse. This module defines the capability interface the
//! orchestrator depends on, plus the concrete backends.
//!
//! # Architecture
//!
//! - `KnowledgeEngine` trait: every engine round trip the orchestrator needs
//! - `EngineClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `BigQueryBackend`, `MockEngine`
//!
//! # Configuration
//!
//! Environment variables:
//! - `EKI_ENGINE`: Backend to use (bigquery, mock). Default: bigquery
//! - `BIGQUERY_ACCESS_TOKEN`: OAuth access token (required for bigquery)
//! - `BIGQUERY_API_BASE`: REST endpoint override (optional)

mod bigquery;
mod mock;
pub mod rows;

pub use bigquery::BigQueryBackend;
pub use mock::{MockEngine, MockFailure};

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{
    ForecastRow, MetricValue, PersonalizedInsight, RecentInsight, SearchHit, UserPreferences,
};

/// Trait defining every external engine capability
///
/// Implementations must be Send + Sync: one handle is shared read-only by
/// all in-flight requests.
#[async_trait]
pub trait KnowledgeEngine: Send + Sync {
    /// Embed text into the knowledge base's vector space
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    /// Top-`k` records nearest to `embedding` that `role` may read,
    /// ordered by descending similarity
    async fn search(&self, embedding: &[f64], k: usize, role: &str) -> Result<Vec<SearchHit>>;

    /// Generate free text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Forecast `horizon_days` points of a metric's series
    async fn forecast(
        &self,
        metric_name: &str,
        horizon_days: u32,
        confidence_level: f64,
    ) -> Result<Vec<ForecastRow>>;

    /// Stored insights targeted at `role` within the window, with relevance
    async fn personalized_insights(
        &self,
        role: &str,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<PersonalizedInsight>>;

    /// Today's key counters
    async fn daily_metrics(&self) -> Result<Vec<MetricValue>>;

    /// Highest-impact insights from the trailing window
    async fn recent_top_insights(
        &self,
        window_hours: u32,
        limit: usize,
    ) -> Result<Vec<RecentInsight>>;

    /// Insert or replace the preferences record for `prefs.user_id`
    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<()>;

    /// Check if the engine is reachable
    async fn health_check(&self) -> bool;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Concrete engine client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum EngineClient {
    /// BigQuery REST backend
    BigQuery(BigQueryBackend),
    /// Deterministic stub for tests and demos
    Mock(MockEngine),
}

impl EngineClient {
    /// Create an engine client from environment variables
    ///
    /// Checks `EKI_ENGINE` to determine which backend to use. Unlike optional
    /// AI features, the engine is required: a misconfigured backend is an
    /// error at startup.
    pub fn from_env(config: &EngineConfig) -> Result<Self> {
        let backend = std::env::var("EKI_ENGINE").unwrap_or_else(|_| "bigquery".to_string());

        match backend.to_lowercase().as_str() {
            "bigquery" | "bq" => BigQueryBackend::from_env(config).map(EngineClient::BigQuery),
            "mock" => Ok(EngineClient::Mock(MockEngine::demo())),
            other => Err(Error::Config(format!(
                "Unknown EKI_ENGINE '{}' (expected bigquery or mock)",
                other
            ))),
        }
    }

    /// Create a mock backend for testing
    pub fn mock(engine: MockEngine) -> Self {
        EngineClient::Mock(engine)
    }
}

// Implement KnowledgeEngine for EngineClient by delegating to the inner backend
#[async_trait]
impl KnowledgeEngine for EngineClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        match self {
            EngineClient::BigQuery(b) => b.embed(text).await,
            EngineClient::Mock(b) => b.embed(text).await,
        }
    }

    async fn search(&self, embedding: &[f64], k: usize, role: &str) -> Result<Vec<SearchHit>> {
        match self {
            EngineClient::BigQuery(b) => b.search(embedding, k, role).await,
            EngineClient::Mock(b) => b.search(embedding, k, role).await,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            EngineClient::BigQuery(b) => b.generate(prompt).await,
            EngineClient::Mock(b) => b.generate(prompt).await,
        }
    }

    async fn forecast(
        &self,
        metric_name: &str,
        horizon_days: u32,
        confidence_level: f64,
    ) -> Result<Vec<ForecastRow>> {
        match self {
            EngineClient::BigQuery(b) => {
                b.forecast(metric_name, horizon_days, confidence_level)
                    .await
            }
            EngineClient::Mock(b) => {
                b.forecast(metric_name, horizon_days, confidence_level)
                    .await
            }
        }
    }

    async fn personalized_insights(
        &self,
        role: &str,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<PersonalizedInsight>> {
        match self {
            EngineClient::BigQuery(b) => b.personalized_insights(role, window_days, limit).await,
            EngineClient::Mock(b) => b.personalized_insights(role, window_days, limit).await,
        }
    }

    async fn daily_metrics(&self) -> Result<Vec<MetricValue>> {
        match self {
            EngineClient::BigQuery(b) => b.daily_metrics().await,
            EngineClient::Mock(b) => b.daily_metrics().await,
        }
    }

    async fn recent_top_insights(
        &self,
        window_hours: u32,
        limit: usize,
    ) -> Result<Vec<RecentInsight>> {
        match self {
            EngineClient::BigQuery(b) => b.recent_top_insights(window_hours, limit).await,
            EngineClient::Mock(b) => b.recent_top_insights(window_hours, limit).await,
        }
    }

    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        match self {
            EngineClient::BigQuery(b) => b.upsert_preferences(prefs).await,
            EngineClient::Mock(b) => b.upsert_preferences(prefs).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            EngineClient::BigQuery(b) => b.health_check().await,
            EngineClient::Mock(b) => b.health_check().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            EngineClient::BigQuery(b) => b.name(),
            EngineClient::Mock(b) => b.name(),
        }
    }
}
