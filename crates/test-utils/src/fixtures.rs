//! Common test fixtures.
//!
//! Dataset names and filenames that mirror the GES DISC archive layout.

use chrono::NaiveDate;

/// Dataset names as they appear in the OpenDAP root catalog.
pub mod datasets {
    pub const OCO2_SIF: &str = "OCO2_L2_Lite_SIF.11r";
    pub const OCO3_SIF: &str = "OCO3_L2_Lite_SIF.11r";
    pub const OCO2_FP: &str = "OCO2_L2_Lite_FP.11.2r";
    /// Sub-daily product organised in day-of-year directories.
    pub const OCO2_PRIOR: &str = "OCO2_L2_CO2Prior.11r";
    /// Always excluded from dataset listings.
    pub const TEST: &str = "test";
}

/// Common bounding boxes as `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Corn belt region used by course exercises.
    pub const MIDWEST: (f64, f64, f64, f64) = (-105.0, 35.0, -80.0, 50.0);

    pub const SMALL: (f64, f64, f64, f64) = (0.0, 0.0, 2.0, 2.0);
}

/// Granule filename prefix for a dataset, e.g. `oco2_LtSIF`.
pub fn granule_prefix(dataset: &str) -> &'static str {
    match (dataset.starts_with("OCO2"), dataset.contains("_SIF")) {
        (true, true) => "oco2_LtSIF",
        (false, true) => "oco3_LtSIF",
        (true, false) => "oco2_LtCO2",
        (false, false) => "oco3_LtCO2",
    }
}

/// Archive filename of the daily granule for `date`.
pub fn granule_filename(dataset: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}_B11012Ar_230628200516s.nc4",
        granule_prefix(dataset),
        date.format("%y%m%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granule_filename() {
        let date = NaiveDate::from_ymd_opt(2019, 12, 1).unwrap();
        assert_eq!(
            granule_filename(datasets::OCO3_SIF, date),
            "oco3_LtSIF_191201_B11012Ar_230628200516s.nc4"
        );
        assert!(granule_filename(datasets::OCO2_FP, date).starts_with("oco2_LtCO2_"));
    }
}
