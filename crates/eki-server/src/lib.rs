//! EKI Web Server
//!
//! Axum-based REST API in front of the insight orchestrator.
//!
//! Security features:
//! - Bearer credential required on every route except the health probe
//! - Optional API key list compared in constant time
//! - Restrictive CORS policy
//! - Sanitized error responses (engine causes are logged, never returned)

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use eki_core::{CallerIdentity, InsightOrchestrator};

mod handlers;

/// Default number of personalized insights returned
pub const DEFAULT_PERSONALIZED_LIMIT: usize = 10;

/// Authorization header for bearer credentials
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Accepted bearer keys. When empty, any non-empty token is accepted
    /// and mapped to the demo identity.
    pub api_keys: Vec<String>,
}

impl ServerConfig {
    /// Build from `EKI_API_KEYS` (comma separated) and `EKI_ALLOWED_ORIGINS`
    pub fn from_env() -> Self {
        Self {
            allowed_origins: parse_list(std::env::var("EKI_ALLOWED_ORIGINS").ok().as_deref()),
            api_keys: parse_list(std::env::var("EKI_API_KEYS").ok().as_deref()),
        }
    }
}

/// Split a comma-separated list, dropping blank entries
pub fn parse_list(input: Option<&str>) -> Vec<String> {
    input
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub orchestrator: InsightOrchestrator,
    pub config: ServerConfig,
}

/// Authentication middleware - requires a bearer credential on every
/// protected route
///
/// On success the resolved [`CallerIdentity`] is attached to the request
/// extensions for handlers to pick up. Rejection happens before any handler
/// runs, so an unauthenticated request never reaches the engine.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let caller = token.and_then(|t| authenticate(t, &state.config.api_keys));

    match caller {
        Some(caller) => {
            info!(user = %caller.user_id, path = %request.uri().path(), "Authenticated via bearer token");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response()
        }
    }
}

/// Credential from an `Authorization` value; the scheme name is case-insensitive
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Resolve a non-empty bearer token to a caller identity
fn authenticate(token: &str, api_keys: &[String]) -> Option<CallerIdentity> {
    if api_keys.is_empty() || validate_api_key(token, api_keys) {
        Some(CallerIdentity::demo())
    } else {
        None
    }
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Health probe response
#[derive(Serialize)]
pub struct StatusResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// GET / - Unauthenticated health probe
async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Enterprise Knowledge Intelligence API",
        status: "active",
    })
}

/// Create the application router
pub fn create_router(orchestrator: InsightOrchestrator, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        orchestrator,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Insights
        .route("/insights/generate", post(handlers::generate_insight))
        .route(
            "/insights/personalized",
            get(handlers::list_personalized_insights),
        )
        // Forecasts
        .route("/forecasts/generate", post(handlers::generate_forecast))
        // Analytics
        .route("/analytics/dashboard", get(handlers::get_dashboard))
        // Users
        .route("/users/preferences", post(handlers::update_preferences))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .route("/", get(root))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    orchestrator: InsightOrchestrator,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if config.api_keys.is_empty() {
        warn!("⚠️  No API keys configured - any non-empty bearer token is accepted");
    }

    check_engine_connection(&orchestrator).await;

    let app = create_router(orchestrator, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log engine connection status
async fn check_engine_connection(orchestrator: &InsightOrchestrator) {
    use eki_core::KnowledgeEngine;

    let engine = orchestrator.engine();
    let config = orchestrator.config();
    if orchestrator.health_check().await {
        info!(
            "✅ Knowledge engine connected: {} (project: {}, dataset: {})",
            engine.name(),
            config.project_id,
            config.dataset
        );
    } else {
        warn!(
            "⚠️  Knowledge engine configured but not responding: {}",
            engine.name()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<eki_core::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<eki_core::Error> for AppError {
    fn from(err: eki_core::Error) -> Self {
        use eki_core::Error;

        match err {
            Error::Validation(msg) => Self::bad_request(&msg),
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::Forbidden(msg) => Self::forbidden(&msg),
            // Already logged by the orchestrator with full context
            Error::OperationFailed(msg) => Self::internal(msg),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(other),
            },
        }
    }
}
