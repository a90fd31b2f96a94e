//! Error types for rendering.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Requested window extends past the raster.
    #[error("requested bounds {requested} are outside the source bounds {source_bounds}")]
    OutOfBounds {
        requested: String,
        source_bounds: String,
    },

    #[error("raster data has {actual} values, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("raster must have at least one pixel, got {width}x{height}")]
    EmptyRaster { width: usize, height: usize },

    #[error("variable not found in gridded slice: {0}")]
    UnknownVariable(String),

    /// Every pixel is masked, so no colour range can be derived.
    #[error("raster has no valid data")]
    NoValidData,

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
