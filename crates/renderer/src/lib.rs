//! Colormapped PNG rendering of single band rasters.
//!
//! A [`Raster`] (from a gridded slice or raw values) is optionally windowed
//! to geographic bounds, masked, normalised, coloured with viridis and
//! encoded as PNG. Each image gets a `<stem>_metadata.json` sidecar carrying
//! its bounds, size, CRS and scaled data range for map overlays.

pub mod error;
pub mod gradient;
pub mod png;
pub mod raster;

pub use error::{RenderError, Result};
pub use gradient::{render_grid, Color, Colormap, Normalize};
pub use png::encode_png;
pub use raster::{metadata_path, Bounds, DataRange, Raster, RenderMetadata, RenderOptions};
