//! EKI Core Library
//!
//! Shared functionality for the Enterprise Knowledge Intelligence tools:
//! - Engine configuration (embedded defaults plus override file)
//! - Knowledge engine capability trait with BigQuery and mock backends
//! - Parameterized SQL templates for retrieval, generation and forecasting
//! - Insight/forecast orchestrator with timeouts, retries and error hiding
//! - Content classifier for community posts
//! - Notebook repair (trigger table and model-reference rewrite)

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notebook;
pub mod orchestrator;
pub mod sql;

/// Test utilities including mock BigQuery server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use classify::{classify_title, ContentCategory, MarketPotential, PerformanceTier};
pub use config::EngineConfig;
pub use engine::{BigQueryBackend, EngineClient, KnowledgeEngine, MockEngine, MockFailure};
pub use error::{Error, Result};
pub use models::{
    Acknowledgement, CallerIdentity, DashboardSnapshot, ForecastRequest, ForecastResponse,
    InsightRequest, InsightResponse, PersonalizedInsights, UserPreferences,
};
pub use notebook::{PatchReport, PatchedCell, RewriteReport, TriggerCategory};
pub use orchestrator::InsightOrchestrator;
