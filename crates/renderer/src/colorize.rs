//! Scalar-to-colour mapping for resampled tiles.

use rayon::prelude::*;
use tile_common::ValueRange;

use crate::palette::Palette;

/// Upper clip of normalised values, so the top value stays in the last bucket.
pub const MAX_NORMALIZED: f32 = 0.999;

/// Map `value` into `[0, MAX_NORMALIZED]` using `range`.
///
/// A range without a usable span (equal or non-finite bounds) maps every
/// value to 0.
pub fn normalize(value: f32, range: ValueRange) -> f32 {
    match range.span() {
        Some(span) if value.is_finite() => ((value - range.low) / span).clamp(0.0, MAX_NORMALIZED),
        _ => 0.0,
    }
}

/// Colour a tile of values into a flat RGBA buffer, rows top to bottom.
///
/// Alpha follows `valid` exactly: 255 for valid pixels, 0 otherwise. A tile
/// without any valid pixel comes back fully transparent.
pub fn render(values: &[f32], valid: &[bool], range: ValueRange, palette: &Palette) -> Vec<u8> {
    let mut pixels = vec![0u8; values.len() * 4];
    if !valid.iter().any(|v| *v) {
        return pixels;
    }

    pixels
        .par_chunks_mut(4)
        .zip(values.par_iter().zip(valid.par_iter()))
        .for_each(|(px, (&value, &ok))| {
            if ok {
                let c = palette.color_at(normalize(value, range));
                px.copy_from_slice(&[c.r, c.g, c.b, 255]);
            }
        });

    pixels
}

/// Whether every pixel of an RGBA buffer has zero alpha.
pub fn is_fully_transparent(pixels: &[u8]) -> bool {
    pixels.chunks_exact(4).all(|px| px[3] == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{Color, PaletteMode};

    fn ten_bands() -> Palette {
        let colors = (0..10).map(|i| Color::new(i * 20, 100, 200 - i * 20, 255)).collect();
        Palette::new("bands", PaletteMode::Discrete, colors).unwrap()
    }

    #[test]
    fn test_normalize_clips() {
        let range = ValueRange::new(10.0, 20.0);
        assert_eq!(normalize(10.0, range), 0.0);
        assert_eq!(normalize(15.0, range), 0.5);
        assert_eq!(normalize(20.0, range), MAX_NORMALIZED);
        assert_eq!(normalize(25.0, range), MAX_NORMALIZED);
        assert_eq!(normalize(-5.0, range), 0.0);
    }

    #[test]
    fn test_normalize_degenerate_range() {
        assert_eq!(normalize(3.0, ValueRange::new(3.0, 3.0)), 0.0);
        assert_eq!(normalize(3.0, ValueRange::new(5.0, 1.0)), 0.0);
        assert_eq!(normalize(3.0, ValueRange::new(f32::NAN, 1.0)), 0.0);
    }

    #[test]
    fn test_low_and_high_hit_first_and_last_bucket() {
        let palette = ten_bands();
        let range = ValueRange::new(-3.5, 41.25);
        assert_eq!(palette.bucket(normalize(range.low, range)), 0);
        assert_eq!(palette.bucket(normalize(range.high, range)), 9);
    }

    #[test]
    fn test_alpha_tracks_mask() {
        let palette = ten_bands();
        let values = [0.0, 1.0, 2.0, f32::NAN];
        let valid = [true, false, true, false];
        let px = render(&values, &valid, ValueRange::new(0.0, 2.0), &palette);
        let alpha: Vec<u8> = px.chunks_exact(4).map(|p| p[3]).collect();
        assert_eq!(alpha, vec![255, 0, 255, 0]);
        // Invalid pixels stay fully zeroed
        assert_eq!(&px[4..8], &[0, 0, 0, 0]);
        // Top value in the last band
        assert_eq!(&px[8..12], &[180, 100, 20, 255]);
    }

    #[test]
    fn test_all_invalid_is_transparent() {
        let palette = ten_bands();
        let values = vec![1.0; 256 * 256];
        let valid = vec![false; 256 * 256];
        let px = render(&values, &valid, ValueRange::new(0.0, 2.0), &palette);
        assert_eq!(px.len(), 256 * 256 * 4);
        assert!(is_fully_transparent(&px));
    }

    #[test]
    fn test_flat_field_uses_first_colour() {
        let palette = ten_bands();
        let px = render(&[7.0, 7.0], &[true, true], ValueRange::new(7.0, 7.0), &palette);
        assert_eq!(&px[0..4], &[0, 100, 200, 255]);
        assert_eq!(&px[4..8], &[0, 100, 200, 255]);
    }
}
