//! Insight handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, DEFAULT_PERSONALIZED_LIMIT};
use eki_core::{CallerIdentity, InsightRequest, InsightResponse, PersonalizedInsights};

/// Query parameters for personalized insights
#[derive(Debug, Deserialize)]
pub struct PersonalizedQuery {
    /// Maximum number of insights (default 10)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_PERSONALIZED_LIMIT
}

/// POST /insights/generate - Retrieve relevant knowledge and generate an insight
///
/// Returns 404 when no knowledge record clears the similarity threshold.
pub async fn generate_insight(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<InsightRequest>,
) -> Result<Json<InsightResponse>, AppError> {
    let insight = state
        .orchestrator
        .generate_insight(&request, &caller)
        .await?;
    Ok(Json(insight))
}

/// GET /insights/personalized - Recent insights targeted at the caller's role
pub async fn list_personalized_insights(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Query(params): Query<PersonalizedQuery>,
) -> Result<Json<PersonalizedInsights>, AppError> {
    let insights = state
        .orchestrator
        .list_personalized_insights(&caller, params.limit)
        .await?;
    Ok(Json(insights))
}
