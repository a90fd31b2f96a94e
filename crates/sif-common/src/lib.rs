//! Common types and utilities shared across the SIF toolkit crates and services.

pub mod error;
pub mod tile;
pub mod time;

pub use error::{SifError, SifResult};
pub use tile::{TileCoord, TileUrlTemplate};
pub use time::{daily_range, day_of_year, eight_day_period_start, parse_yymmdd, year_doy_to_date};
