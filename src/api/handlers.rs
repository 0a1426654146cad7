use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::dashboard::DashboardTemplate;
use crate::aggregate::{current_status, StatusSnapshot};
use crate::history::{CheckRecord, DailyRollup, HistoryStore};

/// Default number of raw checks returned by `/api/history`
pub const DEFAULT_RECENT_CHECKS: usize = 100;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<HistoryStore>,
    pub base_url: String,
    pub endpoint_count: usize,
}

impl AppState {
    fn status(&self) -> StatusSnapshot {
        let snapshot = self.store.snapshot();
        current_status(&snapshot, self.endpoint_count, Utc::now())
    }
}

// ============================================================================
// Dashboard
// ============================================================================

fn render<T: Template>(tmpl: T) -> Html<String> {
    Html(tmpl.render().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to render template");
        format!("<pre>Template error: {e}</pre>")
    }))
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> Html<String> {
    let status = state.status();
    let snapshot = state.store.snapshot();
    render(DashboardTemplate::new(status, &snapshot.daily_stats, &state.base_url))
}

// ============================================================================
// Status
// ============================================================================

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.status())
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub daily_stats: Vec<DailyRollup>,
    pub recent_checks: Vec<CheckRecord>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_CHECKS);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let snapshot = state.store.snapshot();
    Ok(Json(HistoryResponse {
        daily_stats: snapshot.daily_stats.clone(),
        recent_checks: snapshot.recent_checks(limit).to_vec(),
    }))
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub monitoring: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        monitoring: state.base_url.clone(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
