//! Analytics handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{AppError, AppState};
use eki_core::{CallerIdentity, DashboardSnapshot};

/// GET /analytics/dashboard - Today's counters plus the last day's top insights
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<DashboardSnapshot>, AppError> {
    let snapshot = state.orchestrator.get_dashboard_snapshot(&caller).await?;
    Ok(Json(snapshot))
}
