//! Rendering tests: windowing, masking, PNG structure and metadata sidecars.

use std::io::Read;

use flate2::read::ZlibDecoder;
use gridding::{BoundingBox, GridSpec, GriddedSlice, FILL_VALUE};
use renderer::{Bounds, Raster, RenderError, RenderMetadata, RenderOptions};
use test_utils::generators::ramp_grid;

// ============================================================================
// Helper functions
// ============================================================================

/// Split a PNG into `(type, data)` chunks.
fn chunks(png: &[u8]) -> Vec<(String, Vec<u8>)> {
    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    let mut chunks = Vec::new();
    let mut offset = 8;
    while offset < png.len() {
        let len = u32::from_be_bytes(png[offset..offset + 4].try_into().unwrap()) as usize;
        let kind = String::from_utf8(png[offset + 4..offset + 8].to_vec()).unwrap();
        chunks.push((kind, png[offset + 8..offset + 8 + len].to_vec()));
        offset += 12 + len;
    }
    chunks
}

fn chunk<'a>(chunks: &'a [(String, Vec<u8>)], kind: &str) -> Option<&'a [u8]> {
    chunks
        .iter()
        .find(|(k, _)| k == kind)
        .map(|(_, data)| data.as_slice())
}

/// `(width, height, color type)` from IHDR.
fn header(chunks: &[(String, Vec<u8>)]) -> (u32, u32, u8) {
    let ihdr = chunk(chunks, "IHDR").unwrap();
    (
        u32::from_be_bytes(ihdr[0..4].try_into().unwrap()),
        u32::from_be_bytes(ihdr[4..8].try_into().unwrap()),
        ihdr[9],
    )
}

/// Unfiltered scanline bytes with the filter byte dropped.
fn scanlines(chunks: &[(String, Vec<u8>)], row_bytes: usize) -> Vec<Vec<u8>> {
    let mut raw = Vec::new();
    ZlibDecoder::new(chunk(chunks, "IDAT").unwrap())
        .read_to_end(&mut raw)
        .unwrap();
    raw.chunks_exact(row_bytes + 1)
        .map(|row| {
            assert_eq!(row[0], 0);
            row[1..].to_vec()
        })
        .collect()
}

fn ramp_raster(width: usize, height: usize) -> Raster {
    Raster::new(
        ramp_grid(width, height),
        width,
        height,
        Bounds::new(-180.0, -90.0, 180.0, 90.0),
        "EPSG:4326",
    )
    .unwrap()
}

// ============================================================================
// Gridded slices
// ============================================================================

#[test]
fn test_from_slice_is_north_up() {
    let spec = GridSpec::new(BoundingBox::new(0.0, 0.0, 4.0, 2.0), 1.0, 1.0).unwrap();
    let mut slice = GriddedSlice::empty(spec.clone(), vec!["sif".to_string()]);
    // northern row, second column
    slice.data[0][spec.cell_index(1, 1)] = 5.0;
    // southern row, last column
    slice.data[0][spec.cell_index(3, 0)] = 2.0;

    let raster = Raster::from_slice(&slice, "sif").unwrap();
    assert_eq!((raster.width, raster.height), (4, 2));
    assert_eq!(raster.data[1], 5.0);
    assert_eq!(raster.data[7], 2.0);
    assert_eq!(raster.data[0], FILL_VALUE);
    assert_eq!(raster.bounds, Bounds::new(0.0, 0.0, 4.0, 2.0));
    assert_eq!(raster.crs, "EPSG:4326");
    assert_eq!(raster.nodata, Some(FILL_VALUE));

    let (_, metadata) = raster.render(&RenderOptions::default()).unwrap();
    assert_eq!(metadata.data_range.min, 2.0);
    assert_eq!(metadata.data_range.max, 5.0);
}

#[test]
fn test_from_slice_unknown_variable() {
    let slice = GriddedSlice::empty(GridSpec::global(), vec!["sif".to_string()]);
    let err = Raster::from_slice(&slice, "xco2").unwrap_err();
    assert!(matches!(err, RenderError::UnknownVariable(name) if name == "xco2"));
}

// ============================================================================
// PNG output
// ============================================================================

#[test]
fn test_render_indexed_png() {
    let (png, metadata) = ramp_raster(16, 8).render(&RenderOptions::default()).unwrap();

    let chunks = chunks(&png);
    assert_eq!(header(&chunks), (16, 8, 3));
    assert_eq!(chunks.last().unwrap().0, "IEND");

    // first pixel is the bottom of the ramp
    let palette = chunk(&chunks, "PLTE").unwrap();
    let rows = scanlines(&chunks, 16);
    let first = rows[0][0] as usize * 3;
    assert_eq!(&palette[first..first + 3], &[68, 1, 84]);

    assert_eq!(metadata.width, 16);
    assert_eq!(metadata.height, 8);
    assert_eq!(metadata.data_range.min, 0.0);
    assert_eq!(metadata.data_range.max, 127.0);
}

#[test]
fn test_threshold_masks_high_values() {
    let options = RenderOptions {
        threshold: Some(100.0),
        ..Default::default()
    };
    let (png, metadata) = ramp_raster(16, 8).render(&options).unwrap();
    assert_eq!(metadata.data_range.max, 100.0);

    let chunks = chunks(&png);
    let alpha = chunk(&chunks, "tRNS").unwrap();
    let rows = scanlines(&chunks, 16);
    assert_eq!(alpha[rows[0][0] as usize], 255);
    // 127 is the last pixel
    assert_eq!(alpha[rows[7][15] as usize], 0);
}

#[test]
fn test_many_colors_fall_back_to_rgba() {
    // all 256 ramp levels plus transparent
    let options = RenderOptions {
        threshold: Some(4000.0),
        ..Default::default()
    };
    let (png, _) = ramp_raster(64, 64).render(&options).unwrap();

    let chunks = chunks(&png);
    assert_eq!(header(&chunks), (64, 64, 6));
    let rows = scanlines(&chunks, 64 * 4);
    assert_eq!(&rows[0][..4], &[68, 1, 84, 255]);
    assert_eq!(&rows[63][63 * 4..], &[0, 0, 0, 0]);
}

#[test]
fn test_explicit_range_and_scale_factor() {
    let options = RenderOptions {
        vmin: Some(0.0),
        vmax: Some(1000.0),
        scale_factor: 0.0001,
        ..Default::default()
    };
    let (_, metadata) = ramp_raster(16, 8).render(&options).unwrap();
    assert_eq!(metadata.data_range.min, 0.0);
    assert_eq!(metadata.data_range.max, 0.1);
}

#[test]
fn test_all_masked_is_an_error() {
    let raster = Raster::new(vec![FILL_VALUE; 4], 2, 2, Bounds::new(0.0, 0.0, 2.0, 2.0), "EPSG:4326")
        .unwrap()
        .with_nodata(FILL_VALUE);
    assert!(matches!(
        raster.render(&RenderOptions::default()),
        Err(RenderError::NoValidData)
    ));
}

// ============================================================================
// Windows
// ============================================================================

#[test]
fn test_render_window() {
    // 16x8 over the globe: 22.5 degree pixels
    let options = RenderOptions {
        bounds: Some(Bounds::new(-10.0, -10.0, 10.0, 10.0)),
        ..Default::default()
    };
    let (png, metadata) = ramp_raster(16, 8).render(&options).unwrap();

    assert_eq!(metadata.bounds, Bounds::new(-22.5, -22.5, 22.5, 22.5));
    assert_eq!((metadata.width, metadata.height), (2, 2));
    assert_eq!(header(&chunks(&png)), (2, 2, 3));
    // rows 3 and 4, columns 7 and 8
    assert_eq!(metadata.data_range.min, 55.0);
    assert_eq!(metadata.data_range.max, 72.0);
}

#[test]
fn test_window_outside_source_is_rejected() {
    let options = RenderOptions {
        bounds: Some(Bounds::new(-190.0, 0.0, 0.0, 10.0)),
        ..Default::default()
    };
    let err = ramp_raster(16, 8).render(&options).unwrap_err();
    assert!(matches!(err, RenderError::OutOfBounds { .. }));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_render_to_file_writes_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("maps").join("gosif_2020.png");

    let options = RenderOptions {
        scale_factor: 0.5,
        ..Default::default()
    };
    let metadata = ramp_raster(16, 8).render_to_file(&path, &options).unwrap();

    let png = std::fs::read(&path).unwrap();
    assert_eq!(&png[1..4], b"PNG");

    let sidecar = dir.path().join("maps").join("gosif_2020_metadata.json");
    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&sidecar).unwrap()).unwrap();
    assert_eq!(json["bounds"]["left"], -180.0);
    assert_eq!(json["bounds"]["top"], 90.0);
    assert_eq!(json["width"], 16);
    assert_eq!(json["crs"], "EPSG:4326");
    assert_eq!(json["dataRange"]["max"], 63.5);

    let parsed: RenderMetadata = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, metadata);
}
