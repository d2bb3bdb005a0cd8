//! API handlers. All return `Response` via [`ApiResponse::ok`] or
//! [`ApiErrorResponse`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::{ConfigError, ScoringPolicy};
use crate::engine::{AnomalyKind, EngineError, RiskEngine, ValidationError};
use crate::types::{RawSample, RiskScore, Sample};

// ============================================================================
// State
// ============================================================================

/// Shared state for every handler.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<RiskEngine>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(engine: Arc<RiskEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct InjectRequest {
    pub anomaly_type: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: bool,
    pub sample: Sample,
}

#[derive(Debug, Serialize)]
pub struct InjectResponse {
    pub asset_id: String,
    pub anomaly_type: AnomalyKind,
    pub sample: Sample,
    pub risk: RiskScore,
}

#[derive(Debug, Serialize)]
pub struct SamplesResponse {
    pub asset_id: String,
    pub count: usize,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub assets: usize,
    pub uptime_secs: u64,
}

// ============================================================================
// Error mapping
// ============================================================================

fn rejection_response(err: &ValidationError) -> Response {
    ApiErrorResponse::unprocessable(
        "VALIDATION_FAILED",
        err.to_string(),
        serde_json::json!({
            "field": err.field(),
            "rule": err.rule(),
            "value": err.value(),
        }),
    )
}

fn engine_error_response(err: &EngineError) -> Response {
    match err {
        EngineError::Rejected(e) => rejection_response(e),
        EngineError::NotFound(_) | EngineError::NoData(_) => {
            ApiErrorResponse::not_found(err.to_string())
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/telemetry
pub async fn ingest_telemetry(
    State(state): State<ApiState>,
    payload: Result<Json<RawSample>, JsonRejection>,
) -> Response {
    let Json(raw) = match payload {
        Ok(p) => p,
        Err(e) => return ApiErrorResponse::bad_request(format!("Invalid JSON body: {e}")),
    };

    match state.engine.ingest(&raw) {
        Ok(sample) => ApiResponse::ok(IngestResponse {
            accepted: true,
            sample,
        }),
        Err(e) => engine_error_response(&e),
    }
}

/// GET /api/v1/assets
pub async fn list_assets(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.engine.query_fleet())
}

/// GET /api/v1/assets/:id
pub async fn get_asset(State(state): State<ApiState>, Path(asset_id): Path<String>) -> Response {
    match state.engine.query_asset(&asset_id) {
        Ok(snapshot) => ApiResponse::ok(snapshot),
        Err(e) => engine_error_response(&e),
    }
}

/// GET /api/v1/assets/:id/samples?limit=N
pub async fn get_samples(
    State(state): State<ApiState>,
    Path(asset_id): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return ApiErrorResponse::bad_request(format!("Invalid query string: {e}")),
    };
    if q.limit == Some(0) {
        return ApiErrorResponse::bad_request("limit must be > 0");
    }

    match state.engine.window(&asset_id, q.limit) {
        Ok(samples) => ApiResponse::ok(SamplesResponse {
            asset_id,
            count: samples.len(),
            samples,
        }),
        Err(e) => engine_error_response(&e),
    }
}

/// POST /api/v1/assets/:id/anomalies
pub async fn inject_anomaly(
    State(state): State<ApiState>,
    Path(asset_id): Path<String>,
    payload: Result<Json<InjectRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(e) => return ApiErrorResponse::bad_request(format!("Invalid JSON body: {e}")),
    };
    let kind: AnomalyKind = match request.anomaly_type.parse() {
        Ok(k) => k,
        Err(msg) => return ApiErrorResponse::bad_request(msg),
    };

    let sample = match state.engine.inject_anomaly(&asset_id, kind) {
        Ok(s) => s,
        Err(e) => return engine_error_response(&e),
    };
    match state.engine.score(&asset_id) {
        Ok(risk) => ApiResponse::ok(InjectResponse {
            asset_id,
            anomaly_type: kind,
            sample,
            risk,
        }),
        Err(e) => engine_error_response(&e),
    }
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.engine.stats())
}

/// GET /api/v1/policy
pub async fn get_policy(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.engine.policy().as_ref().clone())
}

/// PUT /api/v1/policy
pub async fn replace_policy(
    State(state): State<ApiState>,
    payload: Result<Json<ScoringPolicy>, JsonRejection>,
) -> Response {
    let Json(policy) = match payload {
        Ok(p) => p,
        Err(e) => return ApiErrorResponse::bad_request(format!("Invalid policy: {e}")),
    };

    match state.engine.replace_policy(policy) {
        Ok(()) => ApiResponse::ok(state.engine.policy().as_ref().clone()),
        Err(ConfigError::Validation(errors)) => {
            ApiErrorResponse::invalid("Policy validation failed", errors)
        }
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// GET /health
pub async fn health_check(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        assets: state.engine.history().asset_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
