//! OCO-2/OCO-3 SIF and GOSIF granule downloader.
//!
//! - `gesdisc`: dataset discovery, time ranges and daily granule downloads
//!   from the GES DISC OpenDAP catalog
//! - `gosif`: annual, monthly and 8-day GOSIF products
//! - `download`: retrying HTTP transport writing files atomically

pub mod auth;
pub mod config;
pub mod download;
pub mod error;
pub mod gesdisc;
pub mod gosif;
pub mod listing;
pub mod listing_cache;

pub use auth::Credentials;
pub use config::{ArchiveConfig, RetryPolicy};
pub use download::{ArchiveTransport, HttpTransport};
pub use error::{ArchiveError, ArchiveResult};
pub use gesdisc::{Dataset, DownloadPlan, DownloadReport, GesDiscClient, GranuleRef};
pub use gosif::{download_gosif, gosif_url, GosifPeriod};
