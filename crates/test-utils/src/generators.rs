//! Test data generators.
//!
//! These create predictable, verifiable data: OpenDAP catalog pages in the
//! Hyrax layout, tile payloads, footprint soundings and raster grids.

use chrono::NaiveDate;

use crate::fixtures::granule_filename;

// ============================================================================
// OpenDAP catalog pages
// ============================================================================

const CATALOG_ITEMTYPE: &str = "http://schema.org/DataCatalog";
const DATASET_ITEMTYPE: &str = "http://schema.org/Dataset";

/// A row of an OpenDAP directory listing.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub href: String,
    /// Files carry a size column; directories show `-`.
    pub size: Option<u64>,
}

impl ListingRow {
    pub fn directory(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            size: None,
        }
    }

    pub fn file(href: impl Into<String>, size: u64) -> Self {
        Self {
            href: href.into(),
            size: Some(size),
        }
    }
}

/// Render a Hyrax-style `contents.html` page.
pub fn catalog_page(rows: &[ListingRow]) -> String {
    let mut html = String::from(
        "<html><head><title>OPeNDAP Hyrax: Contents</title></head><body>\n",
    );
    html.push_str(&format!("<table itemtype=\"{}\">\n", CATALOG_ITEMTYPE));
    html.push_str("<tr><th>Name</th><th>Last Modified</th><th>Size</th><th>Response Links</th></tr>\n");
    html.push_str("<tr><td><a href=\"../contents.html\">Parent Directory/</a></td></tr>\n");

    for row in rows {
        let (itemtype, size) = match row.size {
            Some(size) => (DATASET_ITEMTYPE, size.to_string()),
            None => (CATALOG_ITEMTYPE, "-".to_string()),
        };
        html.push_str(&format!(
            "<tr itemtype=\"{}\"><td><a href=\"{}\">{}</a></td><td>2023-06-28T20:05:16</td><td>{}</td><td>-</td></tr>\n",
            itemtype, row.href, row.href, size
        ));
    }

    html.push_str("</table></body></html>\n");
    html
}

/// Root catalog listing one directory per dataset.
pub fn opendap_root_listing(datasets: &[&str]) -> String {
    let rows: Vec<ListingRow> = datasets
        .iter()
        .map(|ds| ListingRow::directory(format!("{}/contents.html", ds)))
        .collect();
    catalog_page(&rows)
}

/// Dataset catalog listing year directories plus a documentation file.
pub fn opendap_dataset_listing(years: &[i32]) -> String {
    let mut rows: Vec<ListingRow> = years
        .iter()
        .map(|year| ListingRow::directory(format!("{}/contents.html", year)))
        .collect();
    rows.push(ListingRow::file("README.pdf.html", 2048));
    catalog_page(&rows)
}

/// Year directory of a daily dataset: one granule per `(date, size)`.
pub fn opendap_daily_listing(dataset: &str, granules: &[(NaiveDate, u64)]) -> String {
    let rows: Vec<ListingRow> = granules
        .iter()
        .map(|(date, size)| {
            ListingRow::file(format!("{}.dmr.html", granule_filename(dataset, *date)), *size)
        })
        .collect();
    catalog_page(&rows)
}

/// Year directory of a sub-daily dataset: one directory per day of year.
pub fn opendap_doy_listing(doys: &[u32]) -> String {
    let rows: Vec<ListingRow> = doys
        .iter()
        .map(|doy| ListingRow::directory(format!("{:03}/contents.html", doy)))
        .collect();
    catalog_page(&rows)
}

// ============================================================================
// Tiles
// ============================================================================

/// Deterministic tile payload derived from `seed` (typically the request URL).
pub fn synthetic_tile(seed: &str) -> Vec<u8> {
    // protobuf field 3 (layers), length-delimited
    let mut payload = vec![0x1a, seed.len().min(127) as u8];
    payload.extend(seed.bytes().take(127));
    payload
}

// ============================================================================
// Grids and footprints
// ============================================================================

/// Row-major grid where each cell holds `row * width + col`.
pub fn ramp_grid(width: usize, height: usize) -> Vec<f32> {
    (0..width * height).map(|i| i as f32).collect()
}

/// Square footprints around each `(lat, lon)` centre.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSoundings {
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    /// Vertex latitudes in `(N, 4)` layout.
    pub vertex_latitude: Vec<f64>,
    /// Vertex longitudes in `(N, 4)` layout.
    pub vertex_longitude: Vec<f64>,
}

impl SyntheticSoundings {
    pub fn len(&self) -> usize {
        self.latitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_empty()
    }

    /// Vertex latitudes transposed to `(4, N)` layout.
    pub fn vertex_latitude_4xn(&self) -> Vec<f64> {
        transpose_vertices(&self.vertex_latitude, self.len())
    }

    /// Vertex longitudes transposed to `(4, N)` layout.
    pub fn vertex_longitude_4xn(&self) -> Vec<f64> {
        transpose_vertices(&self.vertex_longitude, self.len())
    }
}

/// Axis-aligned square footprints with half-width `half` degrees.
pub fn square_footprints(centres: &[(f64, f64)], half: f64) -> SyntheticSoundings {
    let mut out = SyntheticSoundings::default();
    for &(lat, lon) in centres {
        out.latitude.push(lat);
        out.longitude.push(lon);
        out.vertex_latitude
            .extend([lat - half, lat - half, lat + half, lat + half]);
        out.vertex_longitude
            .extend([lon - half, lon + half, lon + half, lon - half]);
    }
    out
}

fn transpose_vertices(nx4: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; nx4.len()];
    for i in 0..n {
        for v in 0..4 {
            out[v * n + i] = nx4[i * 4 + v];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_page_rows() {
        let html = catalog_page(&[
            ListingRow::directory("2019/contents.html"),
            ListingRow::file("a.nc4.html", 42),
        ]);
        assert!(html.contains("href=\"2019/contents.html\""));
        assert!(html.contains("<td>42</td>"));
        assert!(html.contains(DATASET_ITEMTYPE));
    }

    #[test]
    fn test_synthetic_tile_is_deterministic() {
        assert_eq!(synthetic_tile("a/b"), synthetic_tile("a/b"));
        assert_ne!(synthetic_tile("a/b"), synthetic_tile("a/c"));
    }

    #[test]
    fn test_square_footprints_layouts() {
        let s = square_footprints(&[(10.0, 20.0), (11.0, 21.0)], 0.5);
        assert_eq!(s.len(), 2);
        assert_eq!(&s.vertex_latitude[0..4], &[9.5, 9.5, 10.5, 10.5]);

        let t = s.vertex_longitude_4xn();
        // vertex 1 of footprint 0, then of footprint 1
        assert_eq!(t[2], 20.5);
        assert_eq!(t[3], 21.5);
    }

    #[test]
    fn test_ramp_grid() {
        let grid = ramp_grid(3, 2);
        assert_eq!(grid, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
