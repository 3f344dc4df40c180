//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_backend: &'static str,
    pub ai_healthy: bool,
    pub strategy: &'static str,
    pub history: bool,
}

/// GET /api/health - Liveness plus AI backend reachability
///
/// `status` is "ok" when the backend answers and "degraded" otherwise; the
/// endpoint itself always returns 200.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ai_healthy = state.analyzer.health_check().await;
    Json(HealthResponse {
        status: if ai_healthy { "ok" } else { "degraded" },
        ai_backend: state.analyzer.backend_name(),
        ai_healthy,
        strategy: state.analyzer.strategy_name(),
        history: state.db.is_some(),
    })
}
