//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::core_state::{CoreState, HealthReport};

/// `GET /health`
pub async fn check(State(core): State<Arc<CoreState>>) -> Result<Json<HealthReport>, ApiError> {
    Ok(Json(core.health()?))
}
