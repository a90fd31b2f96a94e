//! Error types for gridding.

use thiserror::Error;

/// Errors that can occur while gridding soundings.
#[derive(Error, Debug)]
pub enum GridError {
    /// Grid bounds are empty or reversed.
    #[error("invalid grid bounds: {0}")]
    InvalidBounds(String),

    /// Resolution is zero, negative or not finite.
    #[error("invalid grid resolution: {0}")]
    InvalidResolution(String),

    /// No schema describes the dataset's geolocation variables.
    #[error("unsupported dataset: {0}; no known schema lists its latitude/longitude variables")]
    UnsupportedDataset(String),

    /// A granule lacks a required variable.
    #[error("variable not found in granule: {0}")]
    MissingVariable(String),

    /// A variable does not have one value per sounding.
    #[error("variable {variable} has {actual} values, expected {expected}")]
    ShapeMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    /// Footprint vertices are neither `(4, N)` nor `(N, 4)`.
    #[error("variable {variable} with shape {shape:?} is not a footprint vertex array")]
    InvalidVertexLayout { variable: String, shape: Vec<usize> },

    /// Start date after end date.
    #[error("invalid date range: {0}")]
    InvalidRange(String),
}

impl GridError {
    pub fn missing_variable(name: impl Into<String>) -> Self {
        Self::MissingVariable(name.into())
    }
}

/// Result type for gridding operations.
pub type Result<T> = std::result::Result<T, GridError>;
