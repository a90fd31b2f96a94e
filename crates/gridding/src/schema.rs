//! Geolocation variable names of known Level 2 products.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{GridError, Result};

/// Where a Level 2 product keeps sounding centres and footprint corners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L2Schema {
    /// Archive dataset name pattern, e.g. `OCO2_L2_Lite_SIF.11r`.
    pub dataset_pattern: &'static str,
    /// Granule filename prefix pattern, e.g. `oco2_LtSIF`.
    pub file_pattern: &'static str,
    pub latitude: &'static str,
    pub longitude: &'static str,
    pub vertex_latitude: &'static str,
    pub vertex_longitude: &'static str,
}

static SCHEMAS: [L2Schema; 2] = [
    L2Schema {
        dataset_pattern: r"OCO[23]_L2_Lite_SIF.*r",
        file_pattern: r"oco[23]_LtSIF",
        latitude: "Latitude",
        longitude: "Longitude",
        vertex_latitude: "Geolocation/footprint_latitude_vertices",
        vertex_longitude: "Geolocation/footprint_longitude_vertices",
    },
    L2Schema {
        dataset_pattern: r"OCO[23]_L2_Lite_FP.*r",
        file_pattern: r"oco[23]_LtCO2",
        latitude: "latitude",
        longitude: "longitude",
        vertex_latitude: "vertex_latitude",
        vertex_longitude: "vertex_longitude",
    },
];

// Patterns match at the start of the name.
static MATCHERS: Lazy<Vec<(Regex, Regex)>> = Lazy::new(|| {
    SCHEMAS
        .iter()
        .map(|schema| {
            (
                Regex::new(&format!("^(?:{})", schema.dataset_pattern)).expect("static regex"),
                Regex::new(&format!("^(?:{})", schema.file_pattern)).expect("static regex"),
            )
        })
        .collect()
});

impl L2Schema {
    /// Schema for a dataset name or granule filename.
    pub fn for_dataset(name: &str) -> Result<&'static L2Schema> {
        SCHEMAS
            .iter()
            .zip(MATCHERS.iter())
            .find(|(_, (dataset, file))| dataset.is_match(name) || file.is_match(name))
            .map(|(schema, _)| schema)
            .ok_or_else(|| GridError::UnsupportedDataset(name.to_string()))
    }

    pub fn all() -> &'static [L2Schema] {
        &SCHEMAS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sif_schema() {
        for name in ["OCO2_L2_Lite_SIF.11r", "OCO3_L2_Lite_SIF.10r", "oco3_LtSIF_200501_B10309r.nc4"] {
            let schema = L2Schema::for_dataset(name).unwrap();
            assert_eq!(schema.latitude, "Latitude");
            assert_eq!(schema.vertex_longitude, "Geolocation/footprint_longitude_vertices");
        }
    }

    #[test]
    fn test_fp_schema() {
        let schema = L2Schema::for_dataset("OCO2_L2_Lite_FP.11.2r").unwrap();
        assert_eq!(schema.latitude, "latitude");
        assert_eq!(schema.vertex_latitude, "vertex_latitude");
        assert_eq!(L2Schema::for_dataset("oco2_LtCO2_191201").unwrap(), schema);
    }

    #[test]
    fn test_unknown_dataset() {
        assert!(matches!(
            L2Schema::for_dataset("OCO2_L2_CO2Prior.11r"),
            Err(GridError::UnsupportedDataset(_))
        ));
        // patterns are anchored at the start
        assert!(L2Schema::for_dataset("my_OCO2_L2_Lite_SIF.11r").is_err());
        assert_eq!(L2Schema::all().len(), 2);
    }
}
