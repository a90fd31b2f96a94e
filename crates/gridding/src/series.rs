//! Gridding a range of days into a time series of slices.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use sif_common::daily_range;

use crate::accumulator::{GridAccumulator, GriddedSlice};
use crate::error::{GridError, Result};
use crate::filter::QualityFilter;
use crate::granule::{GranuleSource, MemoryGranule};
use crate::schema::L2Schema;
use crate::types::GridSpec;

/// Supplies the granule of each day.
pub trait GranuleProvider {
    /// `Ok(None)` when there is no granule for `date`.
    fn granule(&self, date: NaiveDate) -> Result<Option<Box<dyn GranuleSource + '_>>>;
}

impl GranuleProvider for HashMap<NaiveDate, MemoryGranule> {
    fn granule(&self, date: NaiveDate) -> Result<Option<Box<dyn GranuleSource + '_>>> {
        Ok(self
            .get(&date)
            .map(|g| Box::new(g.clone()) as Box<dyn GranuleSource>))
    }
}

/// Daily slices over a date range.
#[derive(Debug, Clone)]
pub struct GriddedSeries {
    pub dataset: String,
    pub dates: Vec<NaiveDate>,
    pub slices: Vec<GriddedSlice>,
}

impl GriddedSeries {
    /// Slice times as days since 1970-01-01.
    pub fn time_values(&self) -> Vec<f64> {
        self.dates
            .iter()
            .map(|d| (*d - NaiveDate::default()).num_days() as f64)
            .collect()
    }

    pub fn title(&self) -> String {
        match self.dates.first() {
            Some(start) => format!("{} monthly average {}", start.format("%b %Y"), self.dataset),
            None => self.dataset.clone(),
        }
    }
}

/// Grid each day from `start` to `end` inclusive.
///
/// A missing or unreadable granule leaves that day's slice empty.
pub fn grid_time_range(
    dataset: &str,
    spec: GridSpec,
    variables: Vec<String>,
    filters: Vec<QualityFilter>,
    start: NaiveDate,
    end: NaiveDate,
    provider: &dyn GranuleProvider,
) -> Result<GriddedSeries> {
    if start > end {
        return Err(GridError::InvalidRange(format!("{} is after {}", start, end)));
    }
    let schema = L2Schema::for_dataset(dataset)?;
    let dates = daily_range(start, end);

    info!(
        dataset,
        days = dates.len(),
        n_lon = spec.n_lon(),
        n_lat = spec.n_lat(),
        "Gridding time range"
    );

    let mut accumulator = GridAccumulator::new(spec, schema, variables).with_filters(filters);
    let mut slices = Vec::with_capacity(dates.len());

    for (index, date) in dates.iter().enumerate() {
        match provider.granule(*date) {
            Ok(Some(granule)) => {
                info!(%date, day = index + 1, of = dates.len(), "Gridding granule");
                if let Err(e) = accumulator.add_granule(granule.as_ref()) {
                    warn!(%date, error = %e, "Error adding granule to grid");
                }
            }
            Ok(None) => info!(%date, "No data found, skipping"),
            Err(e) => warn!(%date, error = %e, "Error loading granule"),
        }
        slices.push(accumulator.finish());
        accumulator.reset();
    }

    Ok(GriddedSeries {
        dataset: dataset.to_string(),
        dates,
        slices,
    })
}
