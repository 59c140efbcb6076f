//! Forecast handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{AppError, AppState};
use eki_core::{CallerIdentity, ForecastRequest, ForecastResponse};

/// POST /forecasts/generate - Forecast a metric and interpret the series
pub async fn generate_forecast(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, AppError> {
    let forecast = state
        .orchestrator
        .generate_forecast(&request, &caller)
        .await?;
    Ok(Json(forecast))
}
