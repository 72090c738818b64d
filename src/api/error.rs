//! API error types with structured JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::models::ErrorKind;
use crate::pipeline::error::PipelineError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// An `ErrorKind`, or `RateLimited` from the transport.
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Body that does not deserialize into the request contract.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::ExtractionFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Cancelled => StatusCode::CONFLICT,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message, field) = match &self {
            ApiError::Pipeline(e) => match e.kind() {
                ErrorKind::InternalError => {
                    tracing::error!(error = %e, "API internal error");
                    (ErrorKind::InternalError, "An internal error occurred".to_string(), None)
                }
                kind => (kind, e.to_string(), e.field()),
            },
            ApiError::MalformedBody(detail) => (ErrorKind::ValidationError, detail.clone(), None),
            ApiError::RateLimited { retry_after } => return rate_limited(*retry_after),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: kind.as_str(),
                message,
                field,
            },
        };
        (status_for(kind), Json(body)).into_response()
    }
}

fn rate_limited(retry_after: u64) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "RateLimited",
            message: format!("Rate limit exceeded. Retry after {retry_after}s"),
            field: None,
        },
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("Retry-After", value);
    }
    response
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ExtractionError;
    use crate::pipeline::ingest::IngestError;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn kinds_map_to_statuses() {
        let statuses: Vec<u16> = ErrorKind::ALL.iter().map(|k| status_for(*k).as_u16()).collect();
        assert_eq!(statuses, [415, 413, 422, 400, 404, 409, 500]);
    }

    #[tokio::test]
    async fn validation_error_carries_field() {
        let err = ApiError::from(PipelineError::validation("claims[2].severity", "must be within 0-1"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body(response).await;
        assert_eq!(json["error"]["code"], "ValidationError");
        assert_eq!(json["error"]["field"], "claims[2].severity");
    }

    #[tokio::test]
    async fn ingest_errors_use_their_own_statuses() {
        let response = ApiError::from(PipelineError::from(IngestError::FileTooLarge {
            size_mb: 60.0,
            max_mb: 50.0,
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = ApiError::from(PipelineError::from(ExtractionError::OcrUnavailable)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body(response).await["error"]["code"], "ExtractionFailed");
    }

    #[tokio::test]
    async fn not_found_names_document_id() {
        let response = ApiError::from(PipelineError::NotFound(Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["error"]["field"], "documentId");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "42");
        assert_eq!(body(response).await["error"]["code"], "RateLimited");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = ApiError::from(PipelineError::Internal("lock poisoned".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
        assert!(json["error"].get("field").is_none());
    }
}
