//! Footprint-weighted accumulation of soundings onto a grid.
//!
//! Each sounding's footprint polygon is mapped to fractional cell
//! positions. A footprint inside a single cell adds weight 1 to it. A larger
//! footprint is sampled on an `OVERSAMPLE x OVERSAMPLE` lattice spanning its
//! corners, each sample adding `1 / OVERSAMPLE^2` to the cell it falls in.
//! Cell values are running weighted means.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{GridError, Result};
use crate::filter::QualityFilter;
use crate::granule::{footprint_vertices, sounding_values, GranuleSource};
use crate::schema::L2Schema;
use crate::types::{cell_of, GridSpec};

/// Samples per footprint edge when a footprint spans several cells.
pub const OVERSAMPLE: usize = 10;

/// Value of cells no sounding contributed to.
pub const FILL_VALUE: f32 = -999.0;

/// Footprints spanning this many degrees of longitude or more are dropped.
const MAX_LON_SPAN: f64 = 50.0;

const MIN_WEIGHT: f32 = 1e-10;

/// Running means for one time slice.
pub struct GridAccumulator {
    spec: GridSpec,
    schema: &'static L2Schema,
    variables: Vec<String>,
    filters: Vec<QualityFilter>,
    /// `cell * n_vars + var`
    means: Vec<f32>,
    weights: Vec<f32>,
}

impl GridAccumulator {
    pub fn new(spec: GridSpec, schema: &'static L2Schema, variables: Vec<String>) -> Self {
        let cells = spec.cell_count();
        Self {
            means: vec![0.0; cells * variables.len()],
            weights: vec![0.0; cells],
            spec,
            schema,
            variables,
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<QualityFilter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Add every qualifying sounding of a granule. Returns how many were used.
    ///
    /// A granule with no sounding centre strictly inside the grid bounds is
    /// skipped without reading its footprints.
    pub fn add_granule(&mut self, granule: &dyn GranuleSource) -> Result<usize> {
        let bbox = self.spec.bbox;
        let lat = granule.variable(self.schema.latitude)?.data;
        let soundings = lat.len();
        let lon = sounding_values(granule, self.schema.longitude, soundings)?;

        let overlaps = lat
            .iter()
            .zip(&lon)
            .any(|(la, lo)| bbox.strictly_contains(*lo as f64, *la as f64));
        if !overlaps {
            debug!(date = ?granule.date(), "Granule does not overlap the grid");
            return Ok(0);
        }

        let vertex_lat = footprint_vertices(
            self.schema.vertex_latitude,
            &granule.variable(self.schema.vertex_latitude)?,
        )?;
        let vertex_lon = footprint_vertices(
            self.schema.vertex_longitude,
            &granule.variable(self.schema.vertex_longitude)?,
        )?;
        for (name, vertices) in [
            (self.schema.vertex_latitude, &vertex_lat),
            (self.schema.vertex_longitude, &vertex_lon),
        ] {
            if vertices.len() != soundings {
                return Err(GridError::ShapeMismatch {
                    variable: name.to_string(),
                    expected: soundings,
                    actual: vertices.len(),
                });
            }
        }

        let mut keep: Vec<bool> = vertex_lat
            .iter()
            .zip(&vertex_lon)
            .map(|(vlat, vlon)| {
                let (min_lat, max_lat) = extent(vlat);
                let (min_lon, max_lon) = extent(vlon);
                min_lat > bbox.min_lat
                    && max_lat < bbox.max_lat
                    && min_lon > bbox.min_lon
                    && max_lon < bbox.max_lon
                    && max_lon - min_lon < MAX_LON_SPAN
            })
            .collect();

        for filter in &self.filters {
            let Some(comparator) = filter.comparator() else {
                warn!(filter = %filter, "Ignoring unprocessable filter");
                continue;
            };
            let values = sounding_values(granule, &filter.variable, soundings)?;
            for (kept, value) in keep.iter_mut().zip(values) {
                *kept &= comparator.compare(value, filter.threshold);
            }
        }

        if !keep.iter().any(|k| *k) {
            debug!(date = ?granule.date(), "No footprints passed the bounds and filters");
            return Ok(0);
        }

        let columns = self
            .variables
            .iter()
            .map(|name| sounding_values(granule, name, soundings))
            .collect::<Result<Vec<_>>>()?;

        let mut used = 0;
        let mut row = vec![0.0f32; columns.len()];
        for i in (0..soundings).filter(|&i| keep[i]) {
            for (slot, column) in row.iter_mut().zip(&columns) {
                *slot = column[i];
            }
            if self.add_footprint(&vertex_lat[i], &vertex_lon[i], &row) {
                used += 1;
            }
        }

        info!(date = ?granule.date(), used, soundings, "Added granule to grid");
        Ok(used)
    }

    fn add_footprint(&mut self, vertex_lat: &[f64; 4], vertex_lon: &[f64; 4], row: &[f32]) -> bool {
        let lat_pos = (*vertex_lat).map(|v| self.spec.lat_position(v));
        let lon_pos = (*vertex_lon).map(|v| self.spec.lon_position(v));

        let (min_ilat, max_ilat) = cell_extent(&lat_pos);
        let (min_ilon, max_ilon) = cell_extent(&lon_pos);

        if min_ilat == max_ilat && min_ilon == max_ilon {
            self.accumulate(min_ilon, min_ilat, 1.0, row);
            return true;
        }

        if max_ilon - min_ilon < OVERSAMPLE {
            let weight = 1.0 / (OVERSAMPLE * OVERSAMPLE) as f32;
            for (lat, lon) in subdivide(&lat_pos, &lon_pos, OVERSAMPLE) {
                self.accumulate(cell_of(lon), cell_of(lat), weight, row);
            }
            return true;
        }

        false
    }

    fn accumulate(&mut self, ilon: usize, ilat: usize, weight: f32, row: &[f32]) {
        let cell = self.spec.cell_index(ilon, ilat);
        self.weights[cell] += weight;
        let total = self.weights[cell];

        let n_vars = self.variables.len();
        for (mean, value) in self.means[cell * n_vars..(cell + 1) * n_vars].iter_mut().zip(row) {
            *mean += (weight / total) * (value - *mean);
        }
    }

    /// Any cell received weight.
    pub fn has_data(&self) -> bool {
        self.weights.iter().any(|w| *w > 0.0)
    }

    /// Snapshot of the current means.
    ///
    /// Values are rounded to 6 decimals; cells with weight below `1e-10`
    /// hold `FILL_VALUE`.
    pub fn finish(&self) -> GriddedSlice {
        let n_vars = self.variables.len();
        let data = (0..n_vars)
            .map(|v| {
                self.weights
                    .iter()
                    .enumerate()
                    .map(|(cell, weight)| {
                        if *weight < MIN_WEIGHT {
                            FILL_VALUE
                        } else {
                            round6(self.means[cell * n_vars + v])
                        }
                    })
                    .collect()
            })
            .collect();

        GriddedSlice {
            spec: self.spec.clone(),
            variables: self.variables.clone(),
            data,
            weights: self.weights.clone(),
        }
    }

    /// Clear all cells for the next time slice.
    pub fn reset(&mut self) {
        self.means.fill(0.0);
        self.weights.fill(0.0);
    }
}

/// One gridded time slice. Arrays are ordered `(lon, lat)`.
#[derive(Debug, Clone, Serialize)]
pub struct GriddedSlice {
    pub spec: GridSpec,
    pub variables: Vec<String>,
    /// Means per variable, in `variables` order.
    pub data: Vec<Vec<f32>>,
    /// Summed footprint weight per cell ("number of soundings in average").
    pub weights: Vec<f32>,
}

impl GriddedSlice {
    /// Slice with no data, as produced for a day without a granule.
    pub fn empty(spec: GridSpec, variables: Vec<String>) -> Self {
        let cells = spec.cell_count();
        Self {
            data: vec![vec![FILL_VALUE; cells]; variables.len()],
            weights: vec![0.0; cells],
            spec,
            variables,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        let index = self.variables.iter().position(|v| v == name)?;
        Some(&self.data[index])
    }

    pub fn value(&self, name: &str, ilon: usize, ilat: usize) -> Option<f32> {
        if ilon >= self.spec.n_lon() || ilat >= self.spec.n_lat() {
            return None;
        }
        self.variable(name)
            .map(|data| data[self.spec.cell_index(ilon, ilat)])
    }

    pub fn weight(&self, ilon: usize, ilat: usize) -> f32 {
        self.weights[self.spec.cell_index(ilon, ilat)]
    }

    pub fn has_data(&self) -> bool {
        self.weights.iter().any(|w| *w > 0.0)
    }
}

fn extent(values: &[f64; 4]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

fn cell_extent(positions: &[f64; 4]) -> (usize, usize) {
    let cells = (*positions).map(cell_of);
    let min = cells.iter().copied().min().unwrap_or(0);
    let max = cells.iter().copied().max().unwrap_or(0);
    (min, max)
}

/// `n` evenly spaced midpoints along a segment.
fn divide_line(start: (f64, f64), end: (f64, f64), n: usize) -> Vec<(f64, f64)> {
    let d_lat = (end.0 - start.0) / (2.0 * n as f64);
    let d_lon = (end.1 - start.1) / (2.0 * n as f64);
    (0..n)
        .map(|i| {
            let step = (2 * i + 1) as f64;
            (start.0 + step * d_lat, start.1 + step * d_lon)
        })
        .collect()
}

/// `n x n` sample points across a quadrilateral with corners in order.
fn subdivide(lat: &[f64; 4], lon: &[f64; 4], n: usize) -> Vec<(f64, f64)> {
    let near = divide_line((lat[0], lon[0]), (lat[1], lon[1]), n);
    let far = divide_line((lat[3], lon[3]), (lat[2], lon[2]), n);
    near.iter()
        .zip(&far)
        .flat_map(|(a, b)| divide_line(*a, *b, n))
        .collect()
}

fn round6(value: f32) -> f32 {
    ((value as f64 * 1e6).round() / 1e6) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divide_line_midpoints() {
        let points = divide_line((0.0, 0.0), (1.0, 2.0), 2);
        assert_eq!(points, vec![(0.25, 0.5), (0.75, 1.5)]);
    }

    #[test]
    fn test_subdivide_unit_square() {
        let points = subdivide(&[0.0, 0.0, 1.0, 1.0], &[0.0, 1.0, 1.0, 0.0], 10);
        assert_eq!(points.len(), 100);
        assert!(points
            .iter()
            .all(|(la, lo)| *la > 0.0 && *la < 1.0 && *lo > 0.0 && *lo < 1.0));
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(1.23456789), 1.234568);
    }
}
