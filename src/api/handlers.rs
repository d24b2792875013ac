//! HTTP handlers and router.

use crate::api::models::HealthResponse;
use crate::api::upstream::UpstreamClient;
use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::core::logging::{generate_request_id, REQUEST_ID};
use crate::core::middleware::{request_id_middleware, MetricsMiddleware, RequestId};
use crate::services::RelayEngine;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<RelayEngine>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, upstream: Arc<dyn UpstreamClient>) -> Self {
        let engine = Arc::new(RelayEngine::new(config.clone(), upstream));
        Self { config, engine }
    }
}

/// Build the router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .route("/api/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Relay a chat request as a streaming response.
///
/// The body is taken as raw bytes so that malformed JSON is reported with the
/// same structured error shape as every other validation failure.
pub async fn chat_handler(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> Result<Response> {
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(generate_request_id);

    REQUEST_ID
        .scope(request_id, async move {
            let active = state.engine.relay(&body).await?;
            Ok::<_, AppError>(active.response)
        })
        .await
}

/// Liveness probe, independent of relay state.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(buffer.into())
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_handler() {
        let Json(health) = health_handler().await;
        assert_eq!(health.status, "ok");
        assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        crate::core::metrics::init_metrics();
        let response = metrics_handler().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("chat_relay_active_streams"));
    }

    #[tokio::test]
    async fn test_health_route_without_state() {
        let app: Router = Router::new()
            .route("/api/health", get(health_handler))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
