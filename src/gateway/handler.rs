//! HTTP control API handler

use crate::gateway::Gateway;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// API handler for HTTP endpoints
pub struct ApiHandler;

impl ApiHandler {
    /// Create the router
    pub fn router(gateway: Arc<Gateway>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/status", get(get_status))
            .route("/digest/run", post(run_digest))
            .with_state(gateway)
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get gateway status
async fn get_status(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.status().await)
}

/// Trigger one digest pass and return its report
async fn run_digest(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    tracing::info!("Digest run requested over HTTP");
    match gateway.run_digest().await {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(e) => {
            tracing::error!("Manual digest run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::server::tests::test_gateway;
    use crate::profile::ProfileStore;
    use crate::testing::complete_profile;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_reports_channel_and_digest() {
        let t = test_gateway(true).await;
        let response = get_status(State(Arc::new(t.gateway))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["state"], "Stopped");
        assert_eq!(json["channel"], "recording");
        assert_eq!(json["active_sessions"], 0);
        assert!(json["next_digest"].is_string());
        assert!(json["last_digest"].is_null());
    }

    #[tokio::test]
    async fn test_status_without_digest_has_no_next_run() {
        let t = test_gateway(false).await;
        let json = body_json(get_status(State(Arc::new(t.gateway))).await.into_response()).await;
        assert_eq!(json["digest_enabled"], false);
        assert!(json["next_digest"].is_null());
    }

    #[tokio::test]
    async fn test_manual_digest_run() {
        let t = test_gateway(true).await;
        t.profiles.put("42", &complete_profile()).await.unwrap();
        let channel = t.channel.clone();

        let response = run_digest(State(Arc::new(t.gateway))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["eligible"], 1);
        assert_eq!(json["delivered"], 1);
        assert!(!channel.texts_to("42").is_empty());
    }
}
