//! Tile request handling: preflight, credential check, cache lookup and
//! upstream fetch with background cache population.

use axum::{
    body::Body,
    extract::Extension,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use sif_common::{SifError, SifResult, TileCoord};
use storage::CachedTile;

use crate::state::AppState;
use crate::upstream::TILE_CONTENT_TYPE;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

// ============================================================================
// Entry point
// ============================================================================

/// Handles every request on the tile listener.
#[instrument(skip(state, uri), fields(path = %uri.path()))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method == Method::OPTIONS {
        return preflight_response();
    }

    state.metrics.record_request();

    if method != Method::GET {
        return error_response(&SifError::MethodNotAllowed(method.to_string()));
    }

    let Some(api_key) = state.config.api_key.as_deref() else {
        warn!("Tile request rejected: TILE_API_KEY is not configured");
        return error_response(&SifError::MissingConfiguration(
            "TILE_API_KEY".to_string(),
        ));
    };

    let coord = match TileCoord::from_path(uri.path()) {
        Ok(coord) => coord,
        Err(e) => {
            debug!(error = %e, "Rejected tile path");
            return error_response(&e);
        }
    };

    match serve_tile(&state, coord, api_key).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn serve_tile(state: &Arc<AppState>, coord: TileCoord, api_key: &str) -> SifResult<Response> {
    let cache_key = state.config.cache_key(&coord);

    match state.store.get(&cache_key).await {
        Ok(Some(tile)) => {
            state.metrics.record_cache_hit();
            debug!(tile = %coord, "Cache hit");
            return Ok(hit_response(tile));
        }
        Ok(None) => {}
        Err(e) => {
            state.metrics.record_cache_read_error();
            warn!(tile = %coord, backend = state.store.backend(), error = %e, "Cache lookup failed, treating as miss");
        }
    }
    state.metrics.record_cache_miss();

    let url = state.config.upstream_url(&coord, api_key)?;
    let started = Instant::now();

    let upstream = state.upstream.fetch(&url).await.map_err(|e| {
        state.metrics.record_transport_error();
        warn!(tile = %coord, error = %e, "Upstream request failed");
        e
    })?;

    if !upstream.is_success() {
        state.metrics.record_upstream_error(upstream.status);
        info!(tile = %coord, status = upstream.status, "Upstream returned error status");
        return Err(SifError::Upstream {
            status: upstream.status,
            status_text: upstream.status_text,
        });
    }

    state
        .metrics
        .record_upstream_fetch(started.elapsed().as_micros() as u64, upstream.body.len());

    let tile = CachedTile::new(upstream.body.clone(), TILE_CONTENT_TYPE);
    spawn_cache_write(state.clone(), cache_key, tile);

    Ok(miss_response(upstream.body))
}

/// Store a fetched tile without holding up the response.
fn spawn_cache_write(state: Arc<AppState>, cache_key: String, tile: CachedTile) {
    tokio::spawn(async move {
        let bytes = tile.data.len();
        match state.store.put(&cache_key, tile, state.config.ttl).await {
            Ok(()) => {
                state.metrics.record_cache_write(true);
                debug!(key = %cache_key, bytes, "Cached tile");
            }
            Err(e) => {
                state.metrics.record_cache_write(false);
                warn!(key = %cache_key, backend = state.store.backend(), error = %e, "Failed to cache tile");
            }
        }
    });
}

// ============================================================================
// Responses
// ============================================================================

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers
}

fn freshness_headers(content_type: &str) -> HeaderMap {
    let mut headers = cors_headers();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(TILE_CONTENT_TYPE)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );
    headers
}

/// `204` answer to a CORS preflight on any path.
pub fn preflight_response() -> Response {
    let mut headers = cors_headers();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    (StatusCode::NO_CONTENT, headers).into_response()
}

fn hit_response(tile: CachedTile) -> Response {
    let mut headers = freshness_headers(&tile.content_type);
    headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
    headers.insert(header::AGE, HeaderValue::from(tile.age_secs(Utc::now())));
    (StatusCode::OK, headers, Body::from(tile.data)).into_response()
}

fn miss_response(body: bytes::Bytes) -> Response {
    let mut headers = freshness_headers(TILE_CONTENT_TYPE);
    headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    (StatusCode::OK, headers, Body::from(body)).into_response()
}

/// Plain-text error with the CORS header so browsers can read it.
pub fn error_response(err: &SifError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, cors_headers(), err.client_message()).into_response()
}
