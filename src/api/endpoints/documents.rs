//! Document lifecycle endpoints: whole-pipeline runs, status polling,
//! cancellation and committed results.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::{Claim, DocumentStatus, FeedbackRecord, NormalizedMetric, RiskScore};
use crate::pipeline::error::PipelineError;
use crate::pipeline::validation::ProcessRequest;

fn document_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| PipelineError::validation("documentId", "must be a UUID").into())
}

/// `POST /api/documents/:id/process` starts a background run. The body is
/// optional; an empty one means default options.
pub async fn process(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentStatus>), ApiError> {
    let id = document_id(&id)?;
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))?
    };
    let status = core.process(id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// `GET /api/documents/:id`
pub async fn status(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentStatus>, ApiError> {
    Ok(Json(core.status(&document_id(&id)?)?))
}

/// `POST /api/documents/:id/cancel`
pub async fn cancel(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentStatus>, ApiError> {
    Ok(Json(core.cancel(&document_id(&id)?)?))
}

/// `POST /api/documents/:id/reprocess`
pub async fn reprocess(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentStatus>, ApiError> {
    Ok(Json(core.reprocess(&document_id(&id)?)?))
}

/// `GET /api/documents/:id/metrics`
pub async fn metrics(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NormalizedMetric>>, ApiError> {
    Ok(Json(core.metrics(&document_id(&id)?)?))
}

/// `GET /api/documents/:id/claims`
pub async fn claims(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Claim>>, ApiError> {
    Ok(Json(core.claims(&document_id(&id)?)?))
}

/// `GET /api/documents/:id/scores`: every stored version, oldest first.
pub async fn scores(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RiskScore>>, ApiError> {
    Ok(Json(core.scores(&document_id(&id)?)?))
}

/// `GET /api/documents/:id/feedback`
pub async fn feedback(
    State(core): State<Arc<CoreState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    Ok(Json(core.feedback(&document_id(&id)?)?))
}
