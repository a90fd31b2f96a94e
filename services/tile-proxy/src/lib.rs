//! Caching proxy for upstream vector map tiles.
//!
//! Keeps the upstream API key on the server and caches tiles keyed by the
//! key-less upstream URL.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod upstream;

use axum::{extract::Extension, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Router for the tile listener. Every path and method reaches the tile
/// handler, which does its own method and path validation.
pub fn tile_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handlers::tile_handler)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Router for the admin listener.
pub fn admin_router(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
