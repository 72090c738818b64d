//! Stage boundary endpoints. Each call runs one stage on a known document
//! and leaves the document's lifecycle untouched, except `score`, which
//! appends a score version.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::core_state::{CoreState, FeedbackResponse, IngestResponse, NormalizeResponse, ReasonResponse};
use crate::models::RiskScore;
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::validation::{
    ExtractRequest, FeedbackRequest, IngestRequest, NormalizeRequest, ReasonRequest, ScoreRequest,
};

/// `POST /api/ingest`
pub async fn ingest(
    State(core): State<Arc<CoreState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Json(request) = payload?;
    let response = core.ingest(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/extract`
pub async fn extract(
    State(core): State<Arc<CoreState>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(core.extract(request).await?))
}

/// `POST /api/normalize`
pub async fn normalize(
    State(core): State<Arc<CoreState>>,
    payload: Result<Json<NormalizeRequest>, JsonRejection>,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(core.normalize(request).await?))
}

/// `POST /api/reason`
pub async fn reason(
    State(core): State<Arc<CoreState>>,
    payload: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<Json<ReasonResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(core.reason(request).await?))
}

/// `POST /api/score`
pub async fn score(
    State(core): State<Arc<CoreState>>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RiskScore>), ApiError> {
    let Json(request) = payload?;
    Ok((StatusCode::CREATED, Json(core.score(request)?)))
}

/// `POST /api/feedback`
pub async fn feedback(
    State(core): State<Arc<CoreState>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FeedbackResponse>), ApiError> {
    let Json(request) = payload?;
    Ok((StatusCode::CREATED, Json(core.submit_feedback(request)?)))
}
