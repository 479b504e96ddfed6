// GET handlers: version, metric catalogue, reports, alert state

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use crate::models::{MetricDefinition, WindowClass};
use crate::version::{NAME, VERSION};

const DEFAULT_OCCURRENCE_LIMIT: u32 = 100;

/// Store/report failure -> 500 with a JSON body; logged at WARN.
pub(super) struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, operation = "http", "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RecencyParams {
    hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LimitParams {
    limit: Option<u32>,
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/metrics: every registered metric definition.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let defs: Vec<MetricDefinition> = state.registry.definitions().cloned().collect();
    Json(defs)
}

pub(super) async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.stats.snapshot())
}

/// GET /api/report/{sample|hour|day}?hours=N
pub(super) async fn report_handler(
    State(state): State<AppState>,
    Path(window): Path<String>,
    Query(params): Query<RecencyParams>,
) -> Result<Response, ApiError> {
    let Ok(window) = window.parse::<WindowClass>() else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("unknown window class '{}'", window) })),
        )
            .into_response());
    };
    let report = state.reporter.report(window, params.hours).await?;
    Ok(Json(report).into_response())
}

/// GET /api/report/parameter-changes?hours=N
pub(super) async fn parameter_changes_handler(
    State(state): State<AppState>,
    Query(params): Query<RecencyParams>,
) -> Result<Response, ApiError> {
    let log = state.reporter.parameter_changes(params.hours).await?;
    Ok(Json(log).into_response())
}

pub(super) async fn conditions_handler(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    Ok(Json(state.store.conditions().await?).into_response())
}

pub(super) async fn pending_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.store.pending_alerts().await?).into_response())
}

pub(super) async fn occurrences_handler(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_OCCURRENCE_LIMIT);
    Ok(Json(state.store.occurrences(limit).await?).into_response())
}
