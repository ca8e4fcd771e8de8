//! 1-D linear interpolation over tabulated monotonic relations.
//!
//! Discovery-fraction tables, proper-motion-limit curves and similar survey
//! tables are all queried through [`MonotonicInterp`]: sorted abscissae,
//! binary search for the bracketing interval, linear interpolation inside it.
//! Out-of-domain queries are an error unless extrapolation is explicitly
//! enabled; survey tables normally want the clamped variant instead, which
//! extends the table flat beyond its endpoints.

use thiserror::Error;

/// Errors from tabulated interpolation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpError {
    /// Query point is outside the tabulated domain.
    #[error("value {value} is outside tabulated domain [{min}, {max}]")]
    OutOfBounds { value: f64, min: f64, max: f64 },

    /// Abscissa and ordinate lengths differ, or the table is too short.
    #[error("table needs >= 2 points with equal lengths (got {x_len} x, {y_len} y)")]
    BadTable { x_len: usize, y_len: usize },
}

/// Linear interpolator over a tabulated 1-D relation.
///
/// Abscissae must be strictly ascending. The ordinates carry no ordering
/// requirement of their own; monotonicity of the underlying relation is the
/// caller's contract where it matters (e.g. discovery fractions).
#[derive(Debug, Clone)]
pub struct MonotonicInterp {
    xs: Vec<f64>,
    ys: Vec<f64>,
    allow_extrapolation: bool,
}

impl MonotonicInterp {
    /// Build an interpolator from tabulated points.
    ///
    /// # Panics
    /// Panics if the abscissae are not strictly ascending — an unsorted
    /// table is a programming error, not an input condition.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return Err(InterpError::BadTable {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }
        for i in 1..xs.len() {
            assert!(
                xs[i] > xs[i - 1],
                "abscissae must be strictly ascending at index {i}"
            );
        }
        Ok(Self {
            xs,
            ys,
            allow_extrapolation: false,
        })
    }

    /// Enable linear extrapolation beyond the tabulated domain.
    pub fn with_extrapolation(mut self, allow: bool) -> Self {
        self.allow_extrapolation = allow;
        self
    }

    /// Tabulated domain bounds.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Smallest tabulated ordinate.
    ///
    /// Used to bound sweep windows when the table stands in for a limit
    /// curve (e.g. the most permissive lower proper-motion limit a field
    /// ever reaches).
    pub fn min_value(&self) -> f64 {
        self.ys.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Locate the bracketing interval and the fractional position within it.
    fn bracket(&self, x: f64) -> (usize, f64) {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return (0, (x - self.xs[0]) / (self.xs[1] - self.xs[0]));
        }
        if x >= self.xs[n - 1] {
            let i = n - 2;
            return (i, (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]));
        }
        let mut left = 0;
        let mut right = n - 1;
        while left < right - 1 {
            let mid = (left + right) / 2;
            if x < self.xs[mid] {
                right = mid;
            } else {
                left = mid;
            }
        }
        (left, (x - self.xs[left]) / (self.xs[left + 1] - self.xs[left]))
    }

    /// Interpolate at `x`, erroring outside the domain unless extrapolation
    /// was enabled.
    pub fn eval(&self, x: f64) -> Result<f64, InterpError> {
        let (min, max) = self.domain();
        if (x < min || x > max) && !self.allow_extrapolation {
            return Err(InterpError::OutOfBounds { value: x, min, max });
        }
        let (i, t) = self.bracket(x);
        Ok(self.ys[i] * (1.0 - t) + self.ys[i + 1] * t)
    }

    /// Interpolate at `x`, clamping the query to the tabulated domain.
    ///
    /// This is the right behaviour for survey limit tables: beyond the
    /// tabulated range the limit is taken to hold its endpoint value.
    pub fn eval_clamped(&self, x: f64) -> f64 {
        let (min, max) = self.domain();
        let x = x.clamp(min, max);
        let (i, t) = self.bracket(x);
        self.ys[i] * (1.0 - t) + self.ys[i + 1] * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> MonotonicInterp {
        MonotonicInterp::new(vec![0.0, 1.0, 3.0], vec![10.0, 20.0, 0.0]).unwrap()
    }

    #[test]
    fn interpolates_linearly() {
        let t = table();
        assert_relative_eq!(t.eval(0.5).unwrap(), 15.0, epsilon = 1e-12);
        assert_relative_eq!(t.eval(2.0).unwrap(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn exact_nodes() {
        let t = table();
        assert_relative_eq!(t.eval(0.0).unwrap(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(t.eval(1.0).unwrap(), 20.0, epsilon = 1e-12);
        assert_relative_eq!(t.eval(3.0).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn out_of_domain_errors() {
        let t = table();
        assert!(matches!(
            t.eval(-0.1),
            Err(InterpError::OutOfBounds { .. })
        ));
        assert!(matches!(t.eval(3.1), Err(InterpError::OutOfBounds { .. })));
    }

    #[test]
    fn extrapolation_extends_end_segments() {
        let t = table().with_extrapolation(true);
        assert_relative_eq!(t.eval(-1.0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t.eval(4.0).unwrap(), -10.0, epsilon = 1e-12);
    }

    #[test]
    fn clamped_eval_is_flat_outside() {
        let t = table();
        assert_relative_eq!(t.eval_clamped(-5.0), 10.0, epsilon = 1e-12);
        assert_relative_eq!(t.eval_clamped(99.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn min_value_scans_ordinates() {
        assert_relative_eq!(table().min_value(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_short_table() {
        assert!(matches!(
            MonotonicInterp::new(vec![0.0], vec![1.0]),
            Err(InterpError::BadTable { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn panics_on_unsorted_abscissae() {
        let _ = MonotonicInterp::new(vec![0.0, 2.0, 1.0], vec![0.0, 1.0, 2.0]);
    }
}
