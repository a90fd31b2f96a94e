//! Single band rasters and their conversion to georeferenced PNGs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gridding::{GriddedSlice, FILL_VALUE};

use crate::error::{RenderError, Result};
use crate::gradient::{render_grid, Colormap, Normalize};
use crate::png::encode_png;

/// Geographic extent of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        other.left >= self.left
            && other.bottom >= self.bottom
            && other.right <= self.right
            && other.top <= self.top
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[left {}, bottom {}, right {}, top {}]",
            self.left, self.bottom, self.right, self.top
        )
    }
}

/// North-up single band raster. Row 0 is the northern edge.
#[derive(Debug, Clone)]
pub struct Raster {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub bounds: Bounds,
    pub crs: String,
    pub nodata: Option<f32>,
}

impl Raster {
    pub fn new(data: Vec<f32>, width: usize, height: usize, bounds: Bounds, crs: impl Into<String>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyRaster { width, height });
        }
        if data.len() != width * height {
            return Err(RenderError::DimensionMismatch {
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            bounds,
            crs: crs.into(),
            nodata: None,
        })
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Raster of one variable of a gridded slice.
    ///
    /// Slice cells are `(lon, lat)` with latitude increasing, so rows are
    /// flipped to put the northernmost latitude first.
    pub fn from_slice(slice: &GriddedSlice, variable: &str) -> Result<Self> {
        let values = slice
            .variable(variable)
            .ok_or_else(|| RenderError::UnknownVariable(variable.to_string()))?;
        let spec = &slice.spec;
        let (width, height) = (spec.n_lon(), spec.n_lat());

        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            let ilat = height - 1 - row;
            data.extend((0..width).map(|ilon| values[spec.cell_index(ilon, ilat)]));
        }

        let bounds = Bounds::new(
            spec.bbox.min_lon,
            spec.bbox.min_lat,
            spec.bbox.min_lon + width as f64 * spec.lon_res,
            spec.bbox.min_lat + height as f64 * spec.lat_res,
        );
        Ok(Self::new(data, width, height, bounds, "EPSG:4326")?.with_nodata(FILL_VALUE))
    }

    fn pixel_size(&self) -> (f64, f64) {
        (
            (self.bounds.right - self.bounds.left) / self.width as f64,
            (self.bounds.top - self.bounds.bottom) / self.height as f64,
        )
    }

    /// Sub-raster covering `bounds`, expanded outwards to whole pixels.
    ///
    /// The returned raster carries the pixel-aligned bounds, which may be
    /// slightly larger than the request.
    pub fn window(&self, bounds: &Bounds) -> Result<Raster> {
        let out_of_bounds = || RenderError::OutOfBounds {
            requested: bounds.to_string(),
            source_bounds: self.bounds.to_string(),
        };
        if !self.bounds.contains(bounds) || bounds.left >= bounds.right || bounds.bottom >= bounds.top {
            return Err(out_of_bounds());
        }

        let (res_x, res_y) = self.pixel_size();
        let col_start = pixel_floor((bounds.left - self.bounds.left) / res_x);
        let row_start = pixel_floor((self.bounds.top - bounds.top) / res_y);
        // A sliver along the right or bottom edge rounds onto no pixel
        if col_start >= self.width || row_start >= self.height {
            return Err(out_of_bounds());
        }
        let col_end = pixel_ceil((bounds.right - self.bounds.left) / res_x)
            .clamp(col_start + 1, self.width);
        let row_end = pixel_ceil((self.bounds.top - bounds.bottom) / res_y)
            .clamp(row_start + 1, self.height);

        let width = col_end - col_start;
        let height = row_end - row_start;
        let data = (row_start..row_end)
            .flat_map(|row| {
                let offset = row * self.width;
                self.data[offset + col_start..offset + col_end].iter().copied()
            })
            .collect();

        let actual = Bounds::new(
            self.bounds.left + col_start as f64 * res_x,
            self.bounds.top - row_end as f64 * res_y,
            self.bounds.left + col_end as f64 * res_x,
            self.bounds.top - row_start as f64 * res_y,
        );
        debug!(width, height, bounds = %actual, "Windowed raster");

        Ok(Raster {
            data,
            width,
            height,
            bounds: actual,
            crs: self.crs.clone(),
            nodata: self.nodata,
        })
    }

    /// `true` for cells that should be transparent.
    ///
    /// With a threshold, cells above it are masked and the nodata value is
    /// ignored. NaN is always masked.
    pub fn mask(&self, threshold: Option<f32>) -> Vec<bool> {
        self.data
            .iter()
            .map(|v| {
                v.is_nan()
                    || match threshold {
                        Some(threshold) => *v > threshold,
                        None => self.nodata == Some(*v),
                    }
            })
            .collect()
    }

    /// Colormap the raster into a PNG and describe it.
    pub fn render(&self, options: &RenderOptions) -> Result<(Vec<u8>, RenderMetadata)> {
        let windowed;
        let raster = match &options.bounds {
            Some(bounds) => {
                windowed = self.window(bounds)?;
                &windowed
            }
            None => self,
        };

        let mask = raster.mask(options.threshold);
        let (data_min, data_max) = valid_range(&raster.data, &mask).ok_or(RenderError::NoValidData)?;
        let vmin = options.vmin.unwrap_or(data_min);
        let vmax = options.vmax.unwrap_or(data_max);

        let pixels = render_grid(&raster.data, &mask, Normalize::new(vmin, vmax), &Colormap::viridis());
        let png = encode_png(&pixels, raster.width, raster.height)?;

        let metadata = RenderMetadata {
            bounds: raster.bounds,
            width: raster.width,
            height: raster.height,
            crs: raster.crs.clone(),
            data_range: DataRange {
                min: round5(options.scale_factor * vmin as f64),
                max: round5(options.scale_factor * vmax as f64),
            },
        };
        Ok((png, metadata))
    }

    /// Write the PNG to `path` and its metadata next to it.
    pub fn render_to_file(&self, path: &Path, options: &RenderOptions) -> Result<RenderMetadata> {
        let (png, metadata) = self.render(options)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &png)?;

        let metadata_file = metadata_path(path);
        std::fs::write(&metadata_file, serde_json::to_vec(&metadata)?)?;

        info!(
            png = %path.display(),
            metadata = %metadata_file.display(),
            width = metadata.width,
            height = metadata.height,
            "Rendered raster"
        );
        Ok(metadata)
    }
}

/// Colour range, masking and extent of a render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Unscaled colormap minimum; defaults to the smallest valid value.
    pub vmin: Option<f32>,
    /// Unscaled colormap maximum; defaults to the largest valid value.
    pub vmax: Option<f32>,
    /// Values above this are treated as nodata.
    pub threshold: Option<f32>,
    /// Converts raw values to physical units in the metadata.
    pub scale_factor: f64,
    pub bounds: Option<Bounds>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            vmin: None,
            vmax: None,
            threshold: None,
            scale_factor: 1.0,
            bounds: None,
        }
    }
}

/// Georeferencing sidecar written next to each PNG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub bounds: Bounds,
    pub width: usize,
    pub height: usize,
    pub crs: String,
    #[serde(rename = "dataRange")]
    pub data_range: DataRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub min: f64,
    pub max: f64,
}

/// `out/map.png` → `out/map_metadata.json`
pub fn metadata_path(png_path: &Path) -> PathBuf {
    let stem = png_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    png_path.with_file_name(format!("{}_metadata.json", stem))
}

fn valid_range(data: &[f32], mask: &[bool]) -> Option<(f32, f32)> {
    data.iter()
        .zip(mask)
        .filter(|(_, masked)| !**masked)
        .fold(None, |range, (v, _)| match range {
            None => Some((*v, *v)),
            Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
        })
}

// Tolerate float noise so an exact pixel edge does not pull in a neighbour.
fn pixel_floor(position: f64) -> usize {
    (position + 1e-9).floor().max(0.0) as usize
}

fn pixel_ceil(position: f64) -> usize {
    (position - 1e-9).ceil().max(0.0) as usize
}

fn round5(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}
