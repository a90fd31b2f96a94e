//! Date helpers for daily and 8-day granule products.

use chrono::{Datelike, Duration, NaiveDate};

/// Convert a year and day of year (1-365, or 1-366 in leap years) to a date.
pub fn year_doy_to_date(year: i32, doy: u32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(year, doy)
}

/// Parse the `YYMMDD` date stamp embedded in granule filenames.
pub fn parse_yymmdd(stamp: &str) -> Option<NaiveDate> {
    if stamp.len() != 6 {
        return None;
    }
    NaiveDate::parse_from_str(stamp, "%y%m%d").ok()
}

/// Every date from `start` to `end` inclusive. Empty when `start > end`.
pub fn daily_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        current += Duration::days(1);
    }
    dates
}

/// First day of year of the 8-day composite period containing `doy`.
///
/// Periods start on days 1, 9, 17, 25, ...
pub fn eight_day_period_start(doy: u32) -> u32 {
    1 + 8 * (doy.saturating_sub(1) / 8)
}

/// Day of year for a calendar date.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}
