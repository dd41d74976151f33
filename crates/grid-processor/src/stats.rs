//! Percentile statistics used to normalise colours.

use tile_common::ValueRange;

/// Lower and upper percentiles of the colour range.
pub const LOW_PERCENTILE: f64 = 2.0;
pub const HIGH_PERCENTILE: f64 = 98.0;

/// Percentile of an ascending slice with linear interpolation between
/// order statistics. `p` is in `[0, 100]`.
pub fn percentile(sorted: &[f32], p: f64) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let a = sorted[lo] as f64;
    let b = sorted[hi] as f64;
    Some((a + (b - a) * frac) as f32)
}

/// 2nd/98th percentile of the finite values, or `None` when there are none.
pub fn robust_range(values: &[f32]) -> Option<ValueRange> {
    let mut valid: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_unstable_by(|a, b| a.total_cmp(b));
    Some(ValueRange::new(
        percentile(&valid, LOW_PERCENTILE)?,
        percentile(&valid, HIGH_PERCENTILE)?,
    ))
}
