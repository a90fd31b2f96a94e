//! Error types for SIF toolkit services.

use thiserror::Error;

/// Result type alias using SifError.
pub type SifResult<T> = Result<T, SifError>;

/// Primary error type shared by the tile proxy and its storage backends.
#[derive(Debug, Error)]
pub enum SifError {
    // === Request Errors ===
    #[error("Invalid tile path: {0}")]
    InvalidTilePath(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    // === Configuration Errors ===
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    // === Upstream Errors ===
    #[error("Upstream returned {status}: {status_text}")]
    Upstream { status: u16, status_text: String },

    #[error("Upstream request failed: {0}")]
    Transport(String),

    // === Storage Errors ===
    #[error("Cache error: {0}")]
    CacheError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl SifError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SifError::InvalidTilePath(_) | SifError::InvalidParameter { .. } => 400,

            SifError::MethodNotAllowed(_) => 405,

            SifError::Upstream { status, .. } => *status,

            _ => 500,
        }
    }

    /// Message returned to HTTP clients.
    ///
    /// Upstream failures surface only the upstream status text.
    pub fn client_message(&self) -> String {
        match self {
            SifError::Upstream { status_text, .. } => status_text.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for SifError {
    fn from(err: std::io::Error) -> Self {
        SifError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for SifError {
    fn from(err: serde_json::Error) -> Self {
        SifError::InternalError(format!("JSON error: {}", err))
    }
}
