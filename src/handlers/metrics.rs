use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::ingest::SubmitResponse;
use crate::AppState;

use super::AppError;

// ─── POST /metrics ───────────────────────────────────────────────
// The body is taken as raw bytes so every decode failure, missing field
// included, maps to 400 rather than the extractor's 415/422.

pub async fn submit_metric(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, AppError> {
    let response = state.ingest.submit(&body)?;
    Ok(Json(response))
}

// ─── GET /metrics/prometheus ─────────────────────────────────────

pub async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let text = state
        .requests
        .export()
        .map_err(|e| AppError::Internal(format!("metrics encoding: {e}")))?;

    Ok(([(header::CONTENT_TYPE, state.requests.content_type())], text))
}
