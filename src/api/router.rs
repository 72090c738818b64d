//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Boundary contracts and document routes are nested under `/api/`;
//! `/health` sits at the root.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::core_state::CoreState;

/// Request body ceiling for a given upload limit. Uploads arrive base64
/// encoded inside JSON, so the body may be a third larger than the file.
pub fn body_limit(max_file_size: u64) -> usize {
    let encoded = max_file_size.saturating_mul(4) / 3;
    usize::try_from(encoded.saturating_add(64 * 1024)).unwrap_or(usize::MAX)
}

/// Build the API router.
///
/// Oversized files within the body limit are rejected by the fingerprinter
/// as `FileTooLarge`; bodies beyond it are cut off by the limit layer.
/// Every route, `/health` included, counts against the per-client rate
/// limit.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let limit = body_limit(core.settings().max_file_size);
    let limiter = middleware::rate::RateLimiter::shared(core.settings().rate_limit_per_minute);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/ingest", post(endpoints::stages::ingest))
        .route("/extract", post(endpoints::stages::extract))
        .route("/normalize", post(endpoints::stages::normalize))
        .route("/reason", post(endpoints::stages::reason))
        .route("/score", post(endpoints::stages::score))
        .route("/feedback", post(endpoints::stages::feedback))
        .route("/documents/:id", get(endpoints::documents::status))
        .route("/documents/:id/process", post(endpoints::documents::process))
        .route("/documents/:id/cancel", post(endpoints::documents::cancel))
        .route("/documents/:id/reprocess", post(endpoints::documents::reprocess))
        .route("/documents/:id/metrics", get(endpoints::documents::metrics))
        .route("/documents/:id/claims", get(endpoints::documents::claims))
        .route("/documents/:id/scores", get(endpoints::documents::scores))
        .route("/documents/:id/feedback", get(endpoints::documents::feedback))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/health", get(endpoints::health::check))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(limit))
        .layer(axum::middleware::from_fn_with_state(limiter, middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(CorsLayer::permissive())
        .with_state(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_support::{pdf_document, GREENWASHING_REPORT};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use base64::Engine;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_core_state() -> Arc<CoreState> {
        Arc::new(CoreState::in_memory(Settings::default()).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn upload_body(pages: &[&str]) -> Value {
        json!({
            "filename": "annual-report.pdf",
            "mimeType": "application/pdf",
            "content": base64::engine::general_purpose::STANDARD.encode(pdf_document(pages)),
        })
    }

    async fn ingest(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_json("/api/ingest", upload_body(&[GREENWASHING_REPORT])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["documentId"].as_str().unwrap().to_string()
    }

    #[test]
    fn body_limit_covers_base64_overhead() {
        assert!(body_limit(3_000_000) >= 4_000_000);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = api_router(test_core_state());
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["documents"], 0);
    }

    #[tokio::test]
    async fn requests_over_the_limit_get_429() {
        let settings = Settings {
            rate_limit_per_minute: 3,
            ..Settings::default()
        };
        let app = api_router(Arc::new(CoreState::in_memory(settings).unwrap()));
        for _ in 0..3 {
            let response = app.clone().oneshot(get_request("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let uri = format!("/api/documents/{}", uuid::Uuid::new_v4());
        let response = app.clone().oneshot(get_request(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.headers()["Retry-After"].to_str().unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry_after));
        assert_eq!(json_body(response).await["error"]["code"], "RateLimited");
    }

    #[tokio::test]
    async fn processing_document_refuses_stage_calls() {
        use crate::pipeline::extraction::{
            DocumentExtractor, ExtractionError, NativeTextLayer, PageExtraction, TextLayerEngine,
        };
        use crate::pipeline::reasoning::BenchmarkData;

        struct Paused;
        impl TextLayerEngine for Paused {
            fn extract_pages(
                &self,
                format: crate::models::DocumentFormat,
                bytes: &[u8],
            ) -> Result<Vec<PageExtraction>, ExtractionError> {
                std::thread::sleep(std::time::Duration::from_millis(300));
                NativeTextLayer.extract_pages(format, bytes)
            }
        }

        let settings = Settings::default();
        let extractor = DocumentExtractor::new(Box::new(Paused), crate::core_state::extractor_settings(&settings));
        let core = Arc::new(CoreState::from_parts(
            settings,
            extractor,
            BenchmarkData::builtin().unwrap(),
            crate::db::open_memory_database().unwrap(),
        ));
        let app = api_router(core);
        let id = ingest(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/documents/{id}/process"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::ACCEPTED);

        let response = app
            .clone()
            .oneshot(post_json("/api/extract", json!({ "documentId": id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["field"], "documentId");

        let body = json!({
            "documentId": id,
            "claims": [{ "claimText": "No scope 3", "claimType": "missing_disclosure", "severity": 0.5 }]
        });
        let response = app.clone().oneshot(post_json("/api/score", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ingest_returns_fingerprint_and_marks_duplicates() {
        let app = api_router(test_core_state());
        let first = app
            .clone()
            .oneshot(post_json("/api/ingest", upload_body(&[GREENWASHING_REPORT])))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(first.headers().get("Cache-Control").unwrap(), "no-store");
        let first = json_body(first).await;
        assert_eq!(first["status"], "pending");
        assert!(first["fingerprint"]["fileHash"].as_str().unwrap().starts_with("sha256:"));
        assert!(first.get("duplicateOf").is_none());

        let second = app
            .oneshot(post_json("/api/ingest", upload_body(&[GREENWASHING_REPORT])))
            .await
            .unwrap();
        let second = json_body(second).await;
        assert_eq!(second["duplicateOf"], first["documentId"]);
    }

    #[tokio::test]
    async fn unsupported_format_is_415() {
        let app = api_router(test_core_state());
        let body = json!({
            "filename": "notes.docx",
            "mimeType": "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "content": base64::engine::general_purpose::STANDARD.encode(b"PK\x03\x04not a report"),
        });
        let response = app.oneshot(post_json("/api/ingest", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error"]["code"], "UnsupportedFormat");
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = api_router(test_core_state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/score")
            .header("Content-Type", "application/json")
            .body(Body::from("{\"documentId\": 7"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "ValidationError");
    }

    #[tokio::test]
    async fn unknown_document_is_404() {
        let app = api_router(test_core_state());
        let uri = format!("/api/documents/{}", uuid::Uuid::new_v4());
        let response = app.clone().oneshot(get_request(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/api/documents/not-a-uuid")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["field"], "documentId");
    }

    #[tokio::test]
    async fn stage_by_stage_flow() {
        let app = api_router(test_core_state());
        let id = ingest(&app).await;

        let response = app
            .clone()
            .oneshot(post_json("/api/extract", json!({ "documentId": id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let extraction = json_body(response).await;
        assert_eq!(extraction["strategy"], "fast");
        let text = extraction["extractedText"].clone();

        let response = app
            .clone()
            .oneshot(post_json("/api/normalize", json!({ "documentId": id, "extractedText": text })))
            .await
            .unwrap();
        let metrics = json_body(response).await["metrics"].clone();
        assert!(!metrics.as_array().unwrap().is_empty());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/reason",
                json!({ "documentId": id, "normalizedMetrics": metrics, "extractedText": text }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let claims = json_body(response).await["claims"].clone();
        assert!(!claims.as_array().unwrap().is_empty());

        let response = app
            .clone()
            .oneshot(post_json("/api/score", json!({ "documentId": id, "claims": claims })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let score = json_body(response).await;
        assert_eq!(score["version"], 1);
        assert_eq!(score["riskLevel"], "HIGH");

        // Stage calls leave the lifecycle alone
        let status = json_body(app.oneshot(get_request(&format!("/api/documents/{id}"))).await.unwrap()).await;
        assert_eq!(status["status"], "pending");
    }

    #[tokio::test]
    async fn invalid_claim_reports_field_path() {
        let app = api_router(test_core_state());
        let id = ingest(&app).await;
        let body = json!({
            "documentId": id,
            "claims": [
                { "claimText": "ok", "claimType": "peer_outlier", "severity": 0.4 },
                { "claimText": "bad", "claimType": "peer_outlier", "severity": 1.7 }
            ]
        });
        let response = app.oneshot(post_json("/api/score", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["field"], "claims[1].severity");
    }

    #[tokio::test]
    async fn feedback_on_pending_document_is_rejected() {
        let app = api_router(test_core_state());
        let id = ingest(&app).await;
        let response = app
            .clone()
            .oneshot(post_json("/api/feedback", json!({ "documentId": id, "originalScore": 80.0 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["field"], "documentId");

        let scores = app
            .oneshot(get_request(&format!("/api/documents/{id}/scores")))
            .await
            .unwrap();
        assert_eq!(json_body(scores).await, json!([]));
    }

    #[tokio::test]
    async fn process_runs_in_background() {
        let core = test_core_state();
        let app = api_router(Arc::clone(&core));
        let id = ingest(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/documents/{id}/process"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["status"], "processing");

        let mut status = Value::Null;
        for _ in 0..60 {
            status = json_body(app.clone().oneshot(get_request(&format!("/api/documents/{id}"))).await.unwrap()).await;
            if status["status"] != "processing" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert_eq!(status["status"], "completed");

        let scores = json_body(
            app.clone()
                .oneshot(get_request(&format!("/api/documents/{id}/scores")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(scores.as_array().unwrap().len(), 1);
        let original = scores[0]["score"].as_f64().unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/feedback",
                json!({ "documentId": id, "originalScore": original, "outcomeLabel": "confirmed_risk" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(json_body(response).await["feedbackId"].is_string());

        // A completed document cannot be cancelled
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/documents/{id}/cancel"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
