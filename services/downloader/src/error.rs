//! Error types for archive access.

use chrono::NaiveDate;
use thiserror::Error;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    // === Request Errors ===
    #[error("{0} is not a dataset available on the OCO-2/3 GES DISC")]
    UnknownDataset(String),

    #[error("Dataset {0} is documentation-only or has no available products")]
    NoProducts(String),

    #[error("{dataset} granules are not available on {date}; available dates: {start} to {end}")]
    DateOutOfRange {
        dataset: String,
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("No {dataset} granule found for {date}")]
    GranuleNotFound { dataset: String, date: NaiveDate },

    #[error("Sub-daily dataset {0} is not supported")]
    SubDailyUnsupported(String),

    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid GOSIF request: {0}")]
    InvalidRequest(String),

    // === Transport Errors ===
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Earthdata authentication failed: {0}")]
    Auth(String),

    // === Local Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<url::ParseError> for ArchiveError {
    fn from(err: url::ParseError) -> Self {
        ArchiveError::InvalidUrl(err.to_string())
    }
}

impl ArchiveError {
    /// Server-side overload worth retrying.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ArchiveError::Http { status: 503, .. })
    }
}
