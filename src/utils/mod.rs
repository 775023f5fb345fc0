#![warn(missing_docs)]
//! Small helpers shared across the crate.
pub mod unit_macros;

/// Sample `points` values evenly spaced over `[start, stop]` (both ends included).
///
/// A single point collapses to `start`.
#[must_use]
pub fn linspace(start: f64, stop: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| (i as f64).mul_add(step, start)).collect()
        }
    }
}
