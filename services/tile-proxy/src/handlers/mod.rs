//! HTTP request handlers.
//!
//! - `tiles`: the proxy itself, mounted as the fallback of the tile listener
//! - `health`: health and Prometheus endpoints on the admin listener

pub mod health;
pub mod tiles;

pub use health::{health_handler, metrics_handler, HealthResponse};
pub use tiles::{error_response, preflight_response, tile_handler};
