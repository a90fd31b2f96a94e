//! Gridding of OCO-2/OCO-3 Level 2 soundings.
//!
//! Soundings are averaged onto a regular lat/lon grid, weighting each by
//! the share of its footprint polygon that falls in a cell:
//!
//! ```text
//! granule ──► L2Schema (centre + vertex variable names)
//!    │
//!    ├─► centres strictly inside bounds?  no ──► skip granule
//!    │
//!    ├─► footprint inside bounds, lon span < 50°, filters pass
//!    │
//!    └─► GridAccumulator
//!           ├─ one cell      ──► weight 1
//!           └─ < 10 cells    ──► 10x10 samples, weight 1/100 each
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gridding::{grid_time_range, BoundingBox, GridSpec, QualityFilter};
//!
//! let spec = GridSpec::new(BoundingBox::new(-105.0, 35.0, -80.0, 50.0), 0.5, 0.5)?;
//! let series = grid_time_range(
//!     "OCO3_L2_Lite_SIF.11r",
//!     spec,
//!     vec!["Daily_SIF_757nm".into()],
//!     vec![QualityFilter::new("Quality_Flag", "==", 0.0)],
//!     start,
//!     end,
//!     &provider,
//! )?;
//! ```

pub mod accumulator;
pub mod error;
pub mod filter;
pub mod granule;
pub mod schema;
pub mod series;
pub mod types;

pub use accumulator::{GridAccumulator, GriddedSlice, FILL_VALUE, OVERSAMPLE};
pub use error::{GridError, Result};
pub use filter::{Comparator, QualityFilter};
pub use granule::{footprint_vertices, GranuleSource, MemoryGranule, Variable};
pub use schema::L2Schema;
pub use series::{grid_time_range, GranuleProvider, GriddedSeries};
pub use types::{BoundingBox, GridSpec};
