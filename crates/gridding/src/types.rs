//! Grid geometry.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Get the width in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Get the height in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Point lies inside the box, excluding its edges.
    pub fn strictly_contains(&self, lon: f64, lat: f64) -> bool {
        lon > self.min_lon && lon < self.max_lon && lat > self.min_lat && lat < self.max_lat
    }

    /// `other` lies inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
            && other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        // Global coverage
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }
}

impl From<(f64, f64, f64, f64)> for BoundingBox {
    fn from((min_lon, min_lat, max_lon, max_lat): (f64, f64, f64, f64)) -> Self {
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }
}

/// Regular lat/lon output grid.
///
/// Cell centres run from `min + res/2` up to `max - res/2`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSpec {
    pub bbox: BoundingBox,
    pub lat_res: f64,
    pub lon_res: f64,
    lat_centres: Vec<f64>,
    lon_centres: Vec<f64>,
}

impl GridSpec {
    pub fn new(bbox: BoundingBox, lat_res: f64, lon_res: f64) -> Result<Self> {
        if !(bbox.min_lat < bbox.max_lat && bbox.min_lon < bbox.max_lon) {
            return Err(GridError::InvalidBounds(format!("{:?}", bbox)));
        }
        if bbox.min_lat < -90.0 || bbox.max_lat > 90.0 {
            return Err(GridError::InvalidBounds(format!(
                "latitude range {}..{} exceeds -90..90",
                bbox.min_lat, bbox.max_lat
            )));
        }
        for (axis, res, span) in [("lat", lat_res, bbox.height()), ("lon", lon_res, bbox.width())] {
            if !res.is_finite() || res <= 0.0 {
                return Err(GridError::InvalidResolution(format!("{} resolution {}", axis, res)));
            }
            if res > span {
                return Err(GridError::InvalidResolution(format!(
                    "{} resolution {} exceeds the {} degree extent",
                    axis, res, span
                )));
            }
        }

        Ok(Self {
            lat_centres: cell_centres(bbox.min_lat, bbox.max_lat, lat_res),
            lon_centres: cell_centres(bbox.min_lon, bbox.max_lon, lon_res),
            bbox,
            lat_res,
            lon_res,
        })
    }

    /// One-degree global grid.
    pub fn global() -> Self {
        Self {
            bbox: BoundingBox::default(),
            lat_res: 1.0,
            lon_res: 1.0,
            lat_centres: cell_centres(-90.0, 90.0, 1.0),
            lon_centres: cell_centres(-180.0, 180.0, 1.0),
        }
    }

    pub fn n_lat(&self) -> usize {
        self.lat_centres.len()
    }

    pub fn n_lon(&self) -> usize {
        self.lon_centres.len()
    }

    pub fn lat_centres(&self) -> &[f64] {
        &self.lat_centres
    }

    pub fn lon_centres(&self) -> &[f64] {
        &self.lon_centres
    }

    /// Fractional cell position of a latitude, clipped to the grid.
    pub fn lat_position(&self, lat: f64) -> f64 {
        fractional_position(lat, self.bbox.min_lat, self.bbox.max_lat, self.n_lat())
    }

    /// Fractional cell position of a longitude, clipped to the grid.
    pub fn lon_position(&self, lon: f64) -> f64 {
        fractional_position(lon, self.bbox.min_lon, self.bbox.max_lon, self.n_lon())
    }

    /// Index into `(lon, lat)` ordered cell arrays.
    pub fn cell_index(&self, ilon: usize, ilat: usize) -> usize {
        ilon * self.n_lat() + ilat
    }

    pub fn cell_count(&self) -> usize {
        self.n_lat() * self.n_lon()
    }
}

fn cell_centres(min: f64, max: f64, res: f64) -> Vec<f64> {
    let start = min + res / 2.0;
    let stop = max - res / 2.0 + res / 100.0;
    let count = ((stop - start) / res).ceil().max(1.0) as usize;
    (0..count).map(|i| start + i as f64 * res).collect()
}

fn fractional_position(value: f64, min: f64, max: f64, cells: usize) -> f64 {
    let position = (value - min) / (max - min) * cells as f64;
    position.clamp(0.0, cells as f64 - 1e-6)
}

/// Cell containing a fractional position.
pub fn cell_of(position: f64) -> usize {
    position.floor().max(0.0) as usize
}
