//! Budget parsing and classification handlers (no AI call)

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{AppError, AppState};
use vyapar_core::request::{MAX_BUDGET_CHARS, MAX_IDEA_CHARS, MAX_LOCATION_CHARS, NOT_SPECIFIED};
use vyapar_core::{BudgetAmount, Classification};

#[derive(Debug, Deserialize)]
pub struct BudgetRequest {
    pub budget: String,
}

/// POST /api/budget/parse - Normalize a budget string
pub async fn parse_budget(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BudgetRequest>,
) -> Result<Json<BudgetAmount>, AppError> {
    if request.budget.chars().count() > MAX_BUDGET_CHARS {
        return Err(AppError::bad_request("Budget text is too long"));
    }
    Ok(Json(state.analyzer.parse_budget(&request.budget)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default)]
    pub business_idea: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// POST /api/classify - Business category and city tier for an idea
pub async fn classify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<Classification>, AppError> {
    if request.business_idea.chars().count() > MAX_IDEA_CHARS {
        return Err(AppError::bad_request("Business idea is too long"));
    }
    let location = request
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(NOT_SPECIFIED);
    if location.chars().count() > MAX_LOCATION_CHARS {
        return Err(AppError::bad_request("Location is too long"));
    }

    Ok(Json(state.analyzer.classify(&request.business_idea, location)))
}
