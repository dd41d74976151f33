//! Encoded tiles decoded back chunk by chunk.

use std::collections::HashSet;
use std::io::Read;

use flate2::read::ZlibDecoder;
use renderer::png::{encode_png, encode_rgba};
use renderer::{render, render_png, transparent_png, PaletteRegistry};
use tile_common::ValueRange;

// ============================================================================
// Helper functions
// ============================================================================

/// Split a PNG into (type, data) chunks after checking the signature and CRCs.
fn chunks(png: &[u8]) -> Vec<(String, Vec<u8>)> {
    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    let mut out = Vec::new();
    let mut pos = 8;
    while pos < png.len() {
        let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        let kind = &png[pos + 4..pos + 8];
        let data = &png[pos + 8..pos + 8 + len];
        let crc = u32::from_be_bytes(png[pos + 8 + len..pos + 12 + len].try_into().unwrap());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(kind);
        hasher.update(data);
        assert_eq!(hasher.finalize(), crc, "bad CRC");
        out.push((String::from_utf8(kind.to_vec()).unwrap(), data.to_vec()));
        pos += 12 + len;
    }
    out
}

fn chunk<'a>(chunks: &'a [(String, Vec<u8>)], kind: &str) -> Option<&'a [u8]> {
    chunks.iter().find(|(k, _)| k == kind).map(|(_, d)| d.as_slice())
}

/// (width, height, colour type) from IHDR.
fn header(chunks: &[(String, Vec<u8>)]) -> (u32, u32, u8) {
    let ihdr = chunk(chunks, "IHDR").unwrap();
    (
        u32::from_be_bytes(ihdr[0..4].try_into().unwrap()),
        u32::from_be_bytes(ihdr[4..8].try_into().unwrap()),
        ihdr[9],
    )
}

fn inflate(chunks: &[(String, Vec<u8>)]) -> Vec<u8> {
    let idat = chunk(chunks, "IDAT").unwrap();
    let mut out = Vec::new();
    ZlibDecoder::new(idat).read_to_end(&mut out).unwrap();
    out
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_transparent_tile() {
    let png = transparent_png(256, 256).unwrap();
    let chunks = chunks(&png);
    assert_eq!(header(&chunks), (256, 256, 3));
    assert_eq!(chunk(&chunks, "PLTE").unwrap().len(), 3);
    assert_eq!(chunk(&chunks, "tRNS").unwrap(), &[0]);

    let raw = inflate(&chunks);
    assert_eq!(raw.len(), 256 * 257);
    assert!(raw.iter().all(|b| *b == 0));
    assert_eq!(chunks.last().unwrap().0, "IEND");
}

#[test]
fn test_discrete_tile_is_indexed() {
    let registry = PaletteRegistry::builtin().unwrap();
    let palette = registry.resolve(Some("viridis_10"));
    let values: Vec<f32> = (0..256 * 256).map(|i| (i % 256) as f32).collect();
    let mut valid = vec![true; values.len()];
    valid[0] = false;

    let png = render_png(&values, &valid, 256, 256, ValueRange::new(0.0, 255.0), palette).unwrap();
    let chunks = chunks(&png);
    assert_eq!(header(&chunks), (256, 256, 3));
    // Ten bands plus transparent
    assert_eq!(chunk(&chunks, "PLTE").unwrap().len(), 11 * 3);
    let trns = chunk(&chunks, "tRNS").unwrap();
    assert_eq!(trns.iter().filter(|a| **a == 0).count(), 1);

    let raw = inflate(&chunks);
    assert_eq!(raw.len(), 256 * 257);
    // Filter byte then the transparent pixel's index
    assert_eq!(raw[0], 0);
    assert_eq!(trns[raw[1] as usize], 0);
}

#[test]
fn test_default_palette_is_banded() {
    let registry = PaletteRegistry::builtin().unwrap();
    let palette = registry.resolve(None);
    let values: Vec<f32> = (0..256 * 256).map(|i| i as f32).collect();
    let valid = vec![true; values.len()];
    let range = ValueRange::new(0.0, (256 * 256) as f32);

    let pixels = render(&values, &valid, range, palette);
    let distinct: HashSet<&[u8]> = pixels.chunks_exact(4).collect();
    assert_eq!(distinct.len(), palette.len());

    let png = render_png(&values, &valid, 256, 256, range, palette).unwrap();
    let chunks = chunks(&png);
    assert_eq!(header(&chunks), (256, 256, 3));
    assert_eq!(chunk(&chunks, "PLTE").unwrap().len(), palette.len() * 3);
}

#[test]
fn test_smooth_gradient_falls_back_to_rgba() {
    let registry = PaletteRegistry::builtin().unwrap();
    let palette = registry.resolve(Some("viridis"));
    let values: Vec<f32> = (0..256 * 256).map(|i| i as f32).collect();
    let valid = vec![true; values.len()];

    let png = render_png(
        &values,
        &valid,
        256,
        256,
        ValueRange::new(0.0, (256 * 256) as f32),
        palette,
    )
    .unwrap();
    let chunks = chunks(&png);
    assert_eq!(header(&chunks), (256, 256, 6));
    assert!(chunk(&chunks, "PLTE").is_none());

    let raw = inflate(&chunks);
    assert_eq!(raw.len(), 256 * (1 + 256 * 4));
    // Every pixel opaque
    for row in raw.chunks_exact(1 + 256 * 4) {
        assert!(row[1..].chunks_exact(4).all(|px| px[3] == 255));
    }
}

#[test]
fn test_rgba_roundtrip_preserves_pixels() {
    let pixels: Vec<u8> = (0..4 * 3 * 4).map(|i| (i * 7) as u8).collect();
    let png = encode_rgba(&pixels, 4, 3).unwrap();
    let raw = inflate(&chunks(&png));
    let mut decoded = Vec::new();
    for row in raw.chunks_exact(1 + 16) {
        assert_eq!(row[0], 0);
        decoded.extend_from_slice(&row[1..]);
    }
    assert_eq!(decoded, pixels);
}

#[test]
fn test_opaque_indexed_has_no_trns() {
    let pixels = [10, 20, 30, 255, 40, 50, 60, 255];
    let chunks = chunks(&encode_png(&pixels, 2, 1).unwrap());
    assert_eq!(header(&chunks), (2, 1, 3));
    assert_eq!(chunk(&chunks, "PLTE").unwrap(), &[10, 20, 30, 40, 50, 60]);
    assert!(chunk(&chunks, "tRNS").is_none());
}

#[test]
fn test_palette_override_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("palettes.json");
    std::fs::write(
        &path,
        r##"{"palettes": {"viridis_10": {"mode": "discrete", "colors": ["#010203", "#040506"]}}}"##,
    )
    .unwrap();

    let mut registry = PaletteRegistry::builtin().unwrap();
    registry.load_file(&path).unwrap();
    // Replacing the default palette replaces the fallback too
    let fallback = registry.resolve(Some("missing"));
    assert_eq!(fallback.len(), 2);

    let png = render_png(&[0.0, 1.0], &[true, true], 2, 1, ValueRange::new(0.0, 1.0), fallback)
        .unwrap();
    let chunks = chunks(&png);
    assert_eq!(chunk(&chunks, "PLTE").unwrap(), &[1, 2, 3, 4, 5, 6]);
}
