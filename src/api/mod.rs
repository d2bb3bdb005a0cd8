//! REST API module using Axum
//!
//! JSON endpoints over the risk engine. Every response uses the
//! `{data, meta}` / `{error, meta}` envelope from [`envelope`].

pub mod envelope;
pub mod handlers;
pub mod middleware;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::middleware as axum_mw;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body. A sample or a policy is a few KB.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `CONNECTED_OPS_CORS_ORIGINS` to a comma-separated list of allowed
/// origins for a dashboard served from another host.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var("CONNECTED_OPS_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            routes::api_routes(state.clone()).layer(axum_mw::from_fn(middleware::no_store)),
        )
        .merge(routes::health_routes(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer())
}
