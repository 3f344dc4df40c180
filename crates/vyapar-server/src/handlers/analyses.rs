//! Analysis and history handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{get_user_id, AppError, AppState, SuccessResponse};
use vyapar_core::db::DEFAULT_HISTORY_LIMIT;
use vyapar_core::{AnalysisRequest, AnalysisResult, AnalysisSummary};

/// POST /api/analyze - Run the full pipeline and save the result
///
/// A failed save is logged and does not fail the response.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let user_id = get_user_id(&headers);
    let mut result = state.analyzer.analyze(&request).await?;

    if let Some(ref db) = state.db {
        match db.save_analysis(&user_id, &result) {
            Ok(id) => {
                result.id = Some(id);
                info!(id, user = %user_id, "Analysis saved");
            }
            Err(e) => warn!(error = %e, user = %user_id, "Failed to save analysis"),
        }
    }

    Ok(Json(result))
}

/// Query parameters for history listing
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Number of entries to return (default 20, max 100)
    pub limit: Option<u32>,
}

/// GET /api/analyses - Recent analyses for the caller
pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<AnalysisSummary>>, AppError> {
    let Some(ref db) = state.db else {
        return Ok(Json(Vec::new()));
    };
    let user_id = get_user_id(&headers);
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(db.list_analyses(&user_id, limit)?))
}

/// GET /api/analyses/:id - One stored result
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AnalysisResult>, AppError> {
    let db = state
        .db
        .as_ref()
        .ok_or_else(|| AppError::not_found("Analysis not found"))?;
    let user_id = get_user_id(&headers);

    db.get_analysis(&user_id, id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Analysis not found"))
}

/// DELETE /api/analyses/:id - Remove a stored result
pub async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let db = state
        .db
        .as_ref()
        .ok_or_else(|| AppError::not_found("Analysis not found"))?;
    let user_id = get_user_id(&headers);

    if !db.delete_analysis(&user_id, id)? {
        return Err(AppError::not_found("Analysis not found"));
    }
    info!(id, user = %user_id, "Analysis deleted");
    Ok(Json(SuccessResponse { success: true }))
}
