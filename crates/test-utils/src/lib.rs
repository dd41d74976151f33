//! Shared test utilities for the grid tile workspace.
//!
//! - Synthetic grid generators backed by [`geogrid::MemoryGrid`]
//! - A temporary data directory whose files are paired with in-memory grids

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert that two sampled values agree within `tolerance`.
///
/// NaN is the missing-value sentinel in grids, so a NaN on either side
/// always fails. An optional trailing format string adds context such as a
/// pixel index.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(tile.values[0], 40.0, 1e-3);
/// assert_approx_eq!(v, 5.0, 1e-5, "pixel {}", i);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr $(,)?) => {
        $crate::assert_approx_eq!($actual, $expected, $tolerance, "values differ")
    };
    ($actual:expr, $expected:expr, $tolerance:expr, $($ctx:tt)+) => {{
        let actual = $actual as f64;
        let expected = $expected as f64;
        let tolerance = $tolerance as f64;
        if !((actual - expected).abs() <= tolerance) {
            panic!(
                "{}: got {}, expected {} (tolerance {})",
                format!($($ctx)+),
                actual,
                expected,
                tolerance
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_within_tolerance() {
        assert_approx_eq!(1.0001_f32, 1.0, 0.001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001, "row {}", 3);
    }

    #[test]
    #[should_panic(expected = "pixel 7: got 1.1")]
    fn test_outside_tolerance_reports_context() {
        assert_approx_eq!(1.1, 1.0, 0.001, "pixel {}", 7);
    }

    #[test]
    #[should_panic(expected = "values differ")]
    fn test_nan_never_matches() {
        assert_approx_eq!(f32::NAN, 0.0, 1.0);
    }
}
