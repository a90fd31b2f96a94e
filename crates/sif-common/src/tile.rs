//! Tile addressing: `{z}/{x}/{y}.pbf` request paths and upstream URL templates.

use serde::{Deserialize, Serialize};

use crate::error::{SifError, SifResult};

/// File extension of vector tile requests.
pub const TILE_EXTENSION: &str = ".pbf";

/// Highest zoom level accepted from clients.
pub const MAX_ZOOM: u32 = 24;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Parse a tile coordinate from the trailing `{z}/{x}/{y}.pbf` segments of a path.
    ///
    /// Any prefix before the three segments is ignored, so `/tiles/3/2/1.pbf`
    /// and `/3/2/1.pbf` address the same tile.
    pub fn from_path(path: &str) -> SifResult<Self> {
        let invalid = || SifError::InvalidTilePath(path.to_string());

        let mut segments = path.trim_end_matches('/').rsplit('/');
        let y_segment = segments.next().ok_or_else(invalid)?;
        let x_segment = segments.next().ok_or_else(invalid)?;
        let z_segment = segments.next().ok_or_else(invalid)?;

        let y_digits = y_segment.strip_suffix(TILE_EXTENSION).ok_or_else(invalid)?;

        let z = parse_index(z_segment).ok_or_else(invalid)?;
        let x = parse_index(x_segment).ok_or_else(invalid)?;
        let y = parse_index(y_digits).ok_or_else(invalid)?;

        let coord = Self { z, x, y };
        coord.validate()?;
        Ok(coord)
    }

    /// Check that the zoom is supported and x/y fall inside the zoom's matrix.
    pub fn validate(&self) -> SifResult<()> {
        if self.z > MAX_ZOOM {
            return Err(SifError::InvalidParameter {
                param: "z".to_string(),
                message: format!("zoom {} exceeds maximum {}", self.z, MAX_ZOOM),
            });
        }
        let dim = self.matrix_dimension();
        if self.x >= dim || self.y >= dim {
            return Err(SifError::InvalidParameter {
                param: "x/y".to_string(),
                message: format!(
                    "tile {}/{} outside {}x{} matrix at zoom {}",
                    self.x, self.y, dim, dim, self.z
                ),
            });
        }
        Ok(())
    }

    /// Number of tiles along each axis at this zoom.
    pub fn matrix_dimension(&self) -> u32 {
        1u32 << self.z
    }

    /// Path form used in logs and metrics labels.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Only plain ASCII digits; `u32::from_str` would also accept a leading `+`.
fn parse_index(segment: &str) -> Option<u32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// An upstream tile URL template containing `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileUrlTemplate {
    template: String,
}

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>) -> SifResult<Self> {
        let template = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return Err(SifError::InvalidParameter {
                    param: "upstream_template".to_string(),
                    message: format!("missing {} placeholder in {}", placeholder, template),
                });
            }
        }
        Ok(Self { template })
    }

    /// Substitute a coordinate into the template.
    pub fn expand(&self, coord: &TileCoord) -> String {
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let coord = TileCoord::from_path("/3/2/1.pbf").unwrap();
        assert_eq!(coord, TileCoord::new(3, 2, 1));
    }

    #[test]
    fn test_parse_path_with_prefix() {
        let coord = TileCoord::from_path("/tiles/v3/14/2620/6331.pbf").unwrap();
        assert_eq!(coord, TileCoord::new(14, 2620, 6331));
    }

    #[test]
    fn test_reject_malformed_paths() {
        for path in [
            "/abc/tiles",
            "/",
            "",
            "/3/2/1.png",
            "/3/2/1",
            "/3/+2/1.pbf",
            "/a/2/1.pbf",
            "/2/1.pbf",
            "/3/2/.pbf",
        ] {
            assert!(TileCoord::from_path(path).is_err(), "accepted {}", path);
        }
    }

    #[test]
    fn test_reject_out_of_matrix() {
        assert!(TileCoord::from_path("/0/1/0.pbf").is_err());
        assert!(TileCoord::from_path("/2/3/4.pbf").is_err());
        assert!(TileCoord::from_path("/25/0/0.pbf").is_err());
        assert!(TileCoord::from_path("/2/3/3.pbf").is_ok());
    }

    #[test]
    fn test_template_expand() {
        let template =
            TileUrlTemplate::new("https://tiles.example.com/v3/{z}/{x}/{y}.pbf").unwrap();
        let url = template.expand(&TileCoord::new(5, 10, 12));
        assert_eq!(url, "https://tiles.example.com/v3/5/10/12.pbf");
    }

    #[test]
    fn test_template_requires_placeholders() {
        assert!(TileUrlTemplate::new("https://tiles.example.com/{z}/{x}.pbf").is_err());
    }
}
