//! Ramp generation and reading-stability helpers for sweep loops.
//!
//! Sweep procedures ramp a source in fixed steps, take repeated readings at
//! each step, and advance once the readings settle. The pieces here are pure
//! value types and functions with no I/O:
//!
//! - [`LinearRange`] produces the ramp steps.
//! - [`std_mean_filter`] decides whether a window of readings is stable.
//! - [`Estimate`] counts completed steps for progress reporting.

use serde::{Deserialize, Serialize};

/// Finite linear ramp from `begin` to `end`.
///
/// The sign of the supplied step is ignored: direction is always derived from
/// `end - begin`, so `LinearRange::new(0.0, 4.0, -1.0)` still ramps upward.
/// The step magnitude is additionally bounded by the total distance, so a
/// step larger than the ramp collapses to a single step from `begin` to
/// `end`. A ramp with `begin == end` or `step == 0` is empty.
///
/// The range is a plain value: iterating it a second time restarts from
/// `begin` and yields the same sequence. The final value is `end` itself,
/// not an accumulated sum, so ramps land exactly on their endpoint at any
/// magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearRange {
    /// First value of the ramp.
    pub begin: f64,
    /// Last value of the ramp.
    pub end: f64,
    /// Requested step; only its magnitude is used.
    pub step: f64,
}

impl LinearRange {
    /// Create a ramp from `begin` to `end` in steps of magnitude `|step|`.
    pub fn new(begin: f64, end: f64, step: f64) -> Self {
        Self { begin, end, step }
    }

    /// Total ramp distance, `|end - begin|`.
    pub fn distance(&self) -> f64 {
        (self.end - self.begin).abs()
    }

    /// Step with its magnitude clamped to the distance and its sign derived
    /// from the ramp direction. Zero for an empty ramp.
    fn directed_step(&self) -> f64 {
        let distance = self.distance();
        if self.step == 0.0 || distance == 0.0 {
            return 0.0;
        }
        let magnitude = self.step.abs().min(distance);
        if self.end < self.begin {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Number of values the ramp yields.
    pub fn len(&self) -> usize {
        let step = self.directed_step();
        if step == 0.0 {
            return 0;
        }
        (self.distance() / step.abs()).round() as usize + 1
    }

    /// True when the ramp yields no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for LinearRange {
    type Item = f64;
    type IntoIter = LinearRangeIter;

    fn into_iter(self) -> LinearRangeIter {
        LinearRangeIter {
            range: self,
            step: self.directed_step(),
            index: 0,
            total: self.len(),
        }
    }
}

impl IntoIterator for &LinearRange {
    type Item = f64;
    type IntoIter = LinearRangeIter;

    fn into_iter(self) -> LinearRangeIter {
        (*self).into_iter()
    }
}

/// Iterator over the values of a [`LinearRange`].
#[derive(Clone, Debug)]
pub struct LinearRangeIter {
    range: LinearRange,
    step: f64,
    index: usize,
    total: usize,
}

impl Iterator for LinearRangeIter {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.total {
            return None;
        }
        let value = if self.index + 1 == self.total {
            self.range.end
        } else {
            self.range.begin + self.index as f64 * self.step
        };
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LinearRangeIter {}

/// Relative stability test over a window of readings.
///
/// Computes the sample mean and the sample standard deviation with Bessel's
/// correction (n−1 denominator) and reports whether `stddev / mean` is below
/// `threshold`.
///
/// Policy for the degenerate inputs: a window with fewer than two samples
/// (the corrected deviation is undefined there) or with a mean of exactly
/// zero (the ratio is undefined there) is reported unstable, so callers keep
/// sampling instead of comparing against NaN or infinity.
pub fn std_mean_filter(values: &[f64], threshold: f64) -> bool {
    if values.len() < 2 {
        return false;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return false;
    }
    let variance = values
        .iter()
        .map(|value| {
            let delta = value - mean;
            delta * delta
        })
        .sum::<f64>()
        / (n - 1.0);
    variance.sqrt() / mean < threshold
}

/// Progress counter for "N of M steps done" reporting.
///
/// `advance` is an unconditional increment: a caller that advances past the
/// configured count observes `passed > count`, and consumers of
/// [`Estimate::progress`] must tolerate that.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Estimate {
    count: usize,
    passed: usize,
}

impl Estimate {
    /// Create a counter for `count` expected steps.
    pub fn new(count: usize) -> Self {
        Self { count, passed: 0 }
    }

    /// Record one completed step.
    pub fn advance(&mut self) {
        self.passed += 1;
    }

    /// Number of steps recorded so far.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Number of steps expected at construction.
    pub fn count(&self) -> usize {
        self.count
    }

    /// `(passed, count)` pair for progress display.
    pub fn progress(&self) -> (usize, usize) {
        (self.passed, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(range: LinearRange) -> Vec<f64> {
        range.into_iter().collect()
    }

    #[test]
    fn test_linear_range_upward() {
        assert_eq!(
            collect(LinearRange::new(0.0, 10.0, 2.5)),
            vec![0.0, 2.5, 5.0, 7.5, 10.0]
        );
    }

    #[test]
    fn test_linear_range_downward() {
        assert_eq!(
            collect(LinearRange::new(10.0, 0.0, -2.5)),
            vec![10.0, 7.5, 5.0, 2.5, 0.0]
        );
    }

    #[test]
    fn test_linear_range_sign_auto_corrected() {
        // Caller-supplied sign points the wrong way; direction wins.
        assert_eq!(
            collect(LinearRange::new(0.0, 4.0, -1.0)),
            vec![0.0, 1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(
            collect(LinearRange::new(4.0, 0.0, 1.0)),
            vec![4.0, 3.0, 2.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_linear_range_step_exceeds_distance() {
        assert_eq!(collect(LinearRange::new(1.0, 0.0, 5.0)), vec![1.0, 0.0]);
    }

    #[test]
    fn test_linear_range_empty() {
        for x in [-4.2, 0.0, 1e12] {
            assert!(collect(LinearRange::new(x, x, 1.0)).is_empty());
            assert!(collect(LinearRange::new(x, x, 0.0)).is_empty());
        }
        assert!(collect(LinearRange::new(0.0, 10.0, 0.0)).is_empty());
    }

    #[test]
    fn test_linear_range_restartable() {
        let range = LinearRange::new(0.0, 1.0, 0.25);
        let first: Vec<f64> = range.into_iter().collect();
        let second: Vec<f64> = range.into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_linear_range_len_matches_iteration() {
        let cases = [
            (0.0, 10.0, 2.5),
            (10.0, 0.0, 2.5),
            (0.0, 4.0, -1.0),
            (1.0, 0.0, 5.0),
            (-5.0, 5.0, 0.5),
            (2.0, 2.0, 1.0),
            (0.0, 1.0, 0.0),
            (0.0, 1.0, 0.3),
        ];
        for (begin, end, step) in cases {
            let range = LinearRange::new(begin, end, step);
            assert_eq!(
                range.len(),
                range.into_iter().count(),
                "len mismatch for ({begin}, {end}, {step})"
            );
        }
    }

    #[test]
    fn test_linear_range_extreme_magnitudes() {
        let tiny = LinearRange::new(0.0, 4e-24, 1e-24);
        assert_eq!(tiny.len(), 5);
        let values: Vec<f64> = tiny.into_iter().collect();
        assert_eq!(values[0], 0.0);
        assert_eq!(*values.last().unwrap(), 4e-24);

        let huge = LinearRange::new(0.0, 4e24, 1e24);
        assert_eq!(huge.len(), 5);
        let values: Vec<f64> = huge.into_iter().collect();
        assert_eq!(values[1], 1e24);
        assert_eq!(*values.last().unwrap(), 4e24);
    }

    #[test]
    fn test_linear_range_lands_on_end() {
        // 0.1 steps do not sum exactly in binary; the endpoint still lands.
        let values: Vec<f64> = LinearRange::new(0.0, 1.0, 0.1).into_iter().collect();
        assert_eq!(values.len(), 11);
        assert_eq!(*values.last().unwrap(), 1.0);
    }

    #[test]
    fn test_std_mean_filter_thresholds() {
        assert!(std_mean_filter(&[0.250, 0.249], 0.005));
        assert!(!std_mean_filter(&[0.250, 0.249], 0.0005));
    }

    #[test]
    fn test_std_mean_filter_degenerate_windows() {
        // Fewer than two samples: corrected deviation undefined, unstable.
        assert!(!std_mean_filter(&[], 0.5));
        assert!(!std_mean_filter(&[1.0], 0.5));
        // Zero mean: ratio undefined, unstable.
        assert!(!std_mean_filter(&[-1.0, 1.0], 0.5));
        assert!(!std_mean_filter(&[0.0, 0.0], 0.5));
    }

    #[test]
    fn test_std_mean_filter_uses_bessel_correction() {
        // Population stddev of [2, 4] is 1.0; the corrected sample stddev is
        // sqrt(2). A threshold between the two ratios tells them apart.
        let ratio_corrected = std::f64::consts::SQRT_2 / 3.0;
        assert!(!std_mean_filter(&[2.0, 4.0], ratio_corrected * 0.999));
        assert!(std_mean_filter(&[2.0, 4.0], ratio_corrected * 1.001));
    }

    #[test]
    fn test_estimate_progress() {
        let mut estimate = Estimate::new(42);
        assert_eq!(estimate.progress(), (0, 42));
        for _ in 0..43 {
            estimate.advance();
        }
        assert_eq!(estimate.passed(), 43);
        assert_eq!(estimate.progress(), (43, 42));
    }
}
