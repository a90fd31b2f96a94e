//! Viridis colour ramp for gridded SIF values.

use rayon::prelude::*;

/// RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// Viridis sampled every 1/16 of the ramp.
const VIRIDIS_STOPS: [(u8, u8, u8); 17] = [
    (68, 1, 84),
    (72, 26, 108),
    (71, 47, 125),
    (65, 68, 135),
    (59, 82, 139),
    (52, 96, 141),
    (44, 113, 142),
    (39, 127, 142),
    (33, 145, 140),
    (31, 158, 137),
    (40, 174, 128),
    (63, 188, 115),
    (94, 201, 98),
    (132, 212, 75),
    (173, 220, 48),
    (216, 226, 25),
    (253, 231, 37),
];

/// Number of discrete colours a ramp is quantised to.
pub const RAMP_LEVELS: usize = 256;

/// Linear colour interpolation
fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
        ((color1.a as f32 * t_inv) + (color2.a as f32 * t)).round() as u8,
    )
}

/// A colour ramp quantised to `RAMP_LEVELS` entries.
#[derive(Debug, Clone)]
pub struct Colormap {
    lut: Vec<Color>,
}

impl Colormap {
    pub fn viridis() -> Self {
        let segments = (VIRIDIS_STOPS.len() - 1) as f32;
        let lut = (0..RAMP_LEVELS)
            .map(|level| {
                let position = level as f32 / (RAMP_LEVELS - 1) as f32 * segments;
                let lower = (position.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
                let (r1, g1, b1) = VIRIDIS_STOPS[lower];
                let (r2, g2, b2) = VIRIDIS_STOPS[lower + 1];
                interpolate_color(
                    Color::new(r1, g1, b1, 255),
                    Color::new(r2, g2, b2, 255),
                    position - lower as f32,
                )
            })
            .collect();
        Self { lut }
    }

    /// Colour for a normalised value in `[0, 1]`; out-of-range values clamp.
    pub fn color(&self, t: f32) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        self.lut[(t * (RAMP_LEVELS - 1) as f32).round() as usize]
    }
}

/// Linear mapping of `[vmin, vmax]` onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub vmin: f32,
    pub vmax: f32,
}

impl Normalize {
    pub fn new(vmin: f32, vmax: f32) -> Self {
        Self { vmin, vmax }
    }

    /// A degenerate range maps everything to 0.
    pub fn apply(&self, value: f32) -> f32 {
        let range = self.vmax - self.vmin;
        if range.abs() < f32::EPSILON {
            return 0.0;
        }
        (value - self.vmin) / range
    }
}

/// Render grid data as RGBA pixels; masked cells are transparent.
///
/// # Arguments
/// - `data`: grid values (row-major order)
/// - `mask`: `true` where a cell has no data
/// - `norm`: value range mapped onto the colormap
///
/// # Returns
/// RGBA pixel data (4 bytes per pixel)
pub fn render_grid(data: &[f32], mask: &[bool], norm: Normalize, colormap: &Colormap) -> Vec<u8> {
    let mut pixels = vec![0u8; data.len() * 4];

    pixels
        .par_chunks_mut(4)
        .zip(data.par_iter().zip(mask.par_iter()))
        .for_each(|(pixel, (value, masked))| {
            let color = if *masked {
                Color::transparent()
            } else {
                colormap.color(norm.apply(*value))
            };
            pixel.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        });

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viridis_endpoints() {
        let cmap = Colormap::viridis();
        assert_eq!(cmap.color(0.0), Color::new(68, 1, 84, 255));
        assert_eq!(cmap.color(1.0), Color::new(253, 231, 37, 255));
        assert_eq!(cmap.color(-3.0), cmap.color(0.0));
        assert_eq!(cmap.color(7.0), cmap.color(1.0));
    }

    #[test]
    fn test_normalize() {
        let norm = Normalize::new(10.0, 20.0);
        assert_eq!(norm.apply(15.0), 0.5);
        assert_eq!(norm.apply(10.0), 0.0);
        assert_eq!(Normalize::new(3.0, 3.0).apply(3.0), 0.0);
    }

    #[test]
    fn test_masked_cells_are_transparent() {
        let pixels = render_grid(
            &[0.0, 1.0, 2.0],
            &[false, true, false],
            Normalize::new(0.0, 2.0),
            &Colormap::viridis(),
        );
        assert_eq!(&pixels[0..4], &[68, 1, 84, 255]);
        assert_eq!(&pixels[4..8], &[0, 0, 0, 0]);
        assert_eq!(&pixels[8..12], &[253, 231, 37, 255]);
    }
}
