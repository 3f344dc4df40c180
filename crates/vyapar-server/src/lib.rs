//! Vyapar Web Server
//!
//! Axum-based REST API around the feasibility pipeline.
//!
//! - Restrictive CORS policy and security headers
//! - Request tracing
//! - Input validation before any AI call
//! - Sanitized error responses: internal details are logged, never returned
//!
//! There is no authentication. Callers may send `x-user-id` to key their
//! history; everything else is stored under `anonymous`.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use vyapar_core::{Analyzer, Database};

mod handlers;

/// Maximum request body size (64 KB); the largest legal request is well under this
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Header carrying the caller id for history
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller id used when no valid header is present
pub const ANONYMOUS_USER: &str = "anonymous";

const MAX_USER_ID_CHARS: usize = 64;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// History store; when absent, results are returned but not saved
    pub db: Option<Database>,
}

/// Caller id from the `x-user-id` header
///
/// Only short ids made of letters, digits and `-_.@` are accepted; anything
/// else falls back to [`ANONYMOUS_USER`].
pub fn get_user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.chars().count() <= MAX_USER_ID_CHARS
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        })
        .map_or_else(|| ANONYMOUS_USER.to_string(), str::to_string)
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(
    analyzer: Arc<Analyzer>,
    db: Option<Database>,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> Router {
    info!(
        ai_backend = analyzer.backend_name(),
        strategy = analyzer.strategy_name(),
        history = db.is_some(),
        "Creating router"
    );

    let state = Arc::new(AppState { analyzer, db });

    let api_routes = Router::new()
        // Pipeline
        .route("/analyze", post(handlers::analyze))
        // History
        .route("/analyses", get(handlers::list_analyses))
        .route(
            "/analyses/:id",
            get(handlers::get_analysis).delete(handlers::delete_analysis),
        )
        // Classifier utilities (no AI call)
        .route("/budget/parse", post(handlers::parse_budget))
        .route("/classify", post(handlers::classify))
        // Health
        .route("/health", get(handlers::health));

    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(USER_ID_HEADER)])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(USER_ID_HEADER)])
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self'; frame-ancestors 'none'",
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

pub async fn serve(
    analyzer: Arc<Analyzer>,
    db: Option<Database>,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_ai_connection(&analyzer).await;
    if db.is_none() {
        warn!("History store disabled; analyses will not be saved");
    }

    let app = create_router(analyzer, db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn check_ai_connection(analyzer: &Analyzer) {
    let backend = analyzer.backend_name();
    if backend == "none" {
        warn!("AI backend not configured (set AI_BACKEND and its host); /api/analyze will return 503");
    } else if analyzer.health_check().await {
        info!(backend, "AI backend connected");
    } else {
        warn!(backend, "AI backend configured but not responding");
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
    field: Option<&'static str>,
    internal: Option<String>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            field: None,
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            field: None,
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(ref err) = self.internal {
            if self.status.is_server_error() {
                error!(status = %self.status, error = %err, "Request failed");
            } else {
                warn!(status = %self.status, error = %err, "Request rejected");
            }
        }

        let body = match self.field {
            Some(field) => serde_json::json!({ "error": self.message, "field": field }),
            None => serde_json::json!({ "error": self.message }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<vyapar_core::Error> for AppError {
    fn from(err: vyapar_core::Error) -> Self {
        use vyapar_core::Error as E;

        let status = match err {
            E::Validation { .. } => StatusCode::BAD_REQUEST,
            E::UpstreamRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            E::UpstreamQuotaExhausted(_) | E::Configuration(_) | E::UpstreamUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            E::UpstreamMalformed(_) => StatusCode::BAD_GATEWAY,
            E::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            E::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let field = match err {
            E::Validation { field, .. } => Some(field),
            _ => None,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal error occurred".to_string()
        } else {
            err.user_message()
        };

        Self {
            status,
            message,
            field,
            internal: Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
