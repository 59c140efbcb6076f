//! User preference handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{AppError, AppState};
use eki_core::{Acknowledgement, CallerIdentity, UserPreferences};

/// POST /users/preferences - Store preferences, replacing any existing record
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(preferences): Json<UserPreferences>,
) -> Result<Json<Acknowledgement>, AppError> {
    let ack = state
        .orchestrator
        .update_user_preferences(&preferences, &caller)
        .await?;
    Ok(Json(ack))
}
