//! PNG encoding for RGBA pixel buffers.
//!
//! Two encodings:
//! - **Indexed (color type 3)** when the image has at most 256 distinct
//!   RGBA values, with a `tRNS` chunk when any entry is translucent
//! - **RGBA (color type 6)** otherwise
//!
//! `encode_png` picks between them.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;

use crate::error::{RenderError, Result};

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Minimum pixels to benefit from parallel palette extraction
const PARALLEL_THRESHOLD: usize = 4096;

type Palette = Vec<[u8; 4]>;

/// Encode RGBA pixels, using a palette when the colours fit in one.
pub fn encode_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels.len(), width * height * 4)?;

    let extracted = if width * height >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels)
    } else {
        extract_palette(pixels)
    };

    match extracted {
        Some((palette, indices)) => encode_indexed(width, height, &palette, &indices),
        None => encode_rgba(pixels, width, height),
    }
}

#[inline(always)]
fn pack(pixel: &[u8]) -> u32 {
    u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]])
}

/// Palette and per-pixel indices, or `None` past 256 colours.
fn extract_palette(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut index_of: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for pixel in pixels.chunks_exact(4) {
        let packed = pack(pixel);
        let index = match index_of.get(&packed) {
            Some(&index) => index,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let index = palette.len() as u8;
                palette.push(packed.to_le_bytes());
                index_of.insert(packed, index);
                index
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Palette extraction with the colour scan and index mapping split across
/// threads. Palette entries are sorted so the output is deterministic.
fn extract_palette_parallel(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let chunk_size = (pixels.len() / 4 / rayon::current_num_threads()).max(256) * 4;

    let local_sets: Vec<HashSet<u32>> = pixels
        .par_chunks(chunk_size)
        .map(|chunk| {
            let mut colors = HashSet::with_capacity(MAX_PALETTE_SIZE);
            for pixel in chunk.chunks_exact(4) {
                colors.insert(pack(pixel));
                // Early exit once there are definitely too many colors
                if colors.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            colors
        })
        .collect();

    let mut unique: HashSet<u32> = HashSet::with_capacity(MAX_PALETTE_SIZE);
    for colors in local_sets {
        unique.extend(colors);
        if unique.len() > MAX_PALETTE_SIZE {
            return None;
        }
    }

    let mut sorted: Vec<u32> = unique.into_iter().collect();
    sorted.sort_unstable();
    let index_of: HashMap<u32, u8> = sorted
        .iter()
        .enumerate()
        .map(|(index, packed)| (*packed, index as u8))
        .collect();
    let palette: Palette = sorted.iter().map(|packed| packed.to_le_bytes()).collect();

    let indices = pixels
        .par_chunks_exact(4)
        .map(|pixel| index_of.get(&pack(pixel)).copied().unwrap_or(0))
        .collect();

    Some((palette, indices))
}

/// Indexed PNG (color type 3) from a palette and one index per pixel.
pub fn encode_indexed(width: usize, height: usize, palette: &[[u8; 4]], indices: &[u8]) -> Result<Vec<u8>> {
    check_len(indices.len(), width * height)?;

    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &deflate_scanlines(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// RGBA PNG (color type 6).
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels.len(), width * height * 4)?;

    let mut png = SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));
    write_chunk(&mut png, b"IDAT", &deflate_scanlines(pixels, width * 4, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    data.extend_from_slice(&[8, color_type, 0, 0, 0]);
    data
}

/// Length, type, data, then CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Zlib-compress rows of `row_bytes`, each prefixed with filter type 0.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    encoder.finish().map_err(|e| RenderError::Encode(e.to_string()))
}

fn check_len(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(RenderError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
