//! API route definitions
//!
//! - POST /api/v1/telemetry - ingest one raw sample
//! - GET  /api/v1/assets - fleet ranking and band counts
//! - GET  /api/v1/assets/:id - latest sample, risk, and trend for one asset
//! - GET  /api/v1/assets/:id/samples - recent history window
//! - POST /api/v1/assets/:id/anomalies - inject a synthetic fault
//! - GET  /api/v1/stats - ingestion counters
//! - GET/PUT /api/v1/policy - scoring policy

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

/// Versioned API routes, nested under `/api/v1`.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/telemetry", post(handlers::ingest_telemetry))
        .route("/assets", get(handlers::list_assets))
        .route("/assets/:id", get(handlers::get_asset))
        .route("/assets/:id/samples", get(handlers::get_samples))
        .route("/assets/:id/anomalies", post(handlers::inject_anomaly))
        .route("/stats", get(handlers::get_stats))
        .route("/policy", get(handlers::get_policy).put(handlers::replace_policy))
        .with_state(state)
}

/// Liveness endpoint at root level
pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::RiskEngine;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> ApiState {
        ApiState::new(Arc::new(RiskEngine::new(EngineConfig::default())))
    }

    #[tokio::test]
    async fn test_api_routes_assets_empty() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/assets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = health_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_asset_is_404() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/assets/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
