//! Admin endpoints: health check and Prometheus metrics.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub api_key_configured: bool,
    pub metrics: MetricsSnapshot,
}

/// GET /health
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "tile-proxy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend(),
        api_key_configured: state.config.api_key.is_some(),
        metrics: state.metrics.snapshot(),
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(handle): Extension<PrometheusHandle>,
) -> Response {
    if let Some(stats) = &state.memory_stats {
        state.metrics.record_memory_store_stats(stats);
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}
