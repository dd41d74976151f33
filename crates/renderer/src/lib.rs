//! Tile colouring and image encoding.
//!
//! - Scalar values to RGBA through discrete or continuous palettes
//! - Palette registry with built-in palettes and JSON overrides
//! - PNG encoding (indexed or RGBA)

pub mod colorize;
pub mod error;
pub mod palette;
pub mod png;

pub use colorize::{is_fully_transparent, normalize, render, MAX_NORMALIZED};
pub use error::{RenderError, RenderResult};
pub use palette::{
    Color, Palette, PaletteConfig, PaletteDefinition, PaletteMode, PaletteRegistry,
    DEFAULT_PALETTE,
};
pub use png::encode_png;

use tile_common::ValueRange;

/// Colour a tile and encode it as PNG.
pub fn render_png(
    values: &[f32],
    valid: &[bool],
    width: usize,
    height: usize,
    range: ValueRange,
    palette: &Palette,
) -> RenderResult<Vec<u8>> {
    let pixels = render(values, valid, range, palette);
    encode_png(&pixels, width, height)
}

/// A fully transparent PNG of the given size.
pub fn transparent_png(width: usize, height: usize) -> RenderResult<Vec<u8>> {
    encode_png(&vec![0u8; width * height * 4], width, height)
}
