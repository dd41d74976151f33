//! Value ranges used to normalise colours.

use serde::{Deserialize, Serialize};

/// Inclusive `[low, high]` span of data values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub low: f32,
    pub high: f32,
}

impl ValueRange {
    pub fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    /// Span usable as a divisor: finite and strictly positive.
    pub fn span(&self) -> Option<f32> {
        let span = self.high - self.low;
        (self.low.is_finite() && self.high.is_finite() && span > 0.0).then_some(span)
    }
}
