//! Tabulated one-dimensional curves.
//!
//! Calibration tables (sky radiance, atmospheric transmission, tabulated
//! source spectra) are sampled on a sorted abscissa and evaluated by
//! linear interpolation. [`TabulatedCurve`] validates the table once on
//! construction so evaluation in the render loop is a binary search and a
//! lerp with no further checks.

use thiserror::Error;

/// Errors raised while building or evaluating a tabulated curve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Tabulated curve needs at least 2 points, got {0}")]
    InsufficientData(usize),
    #[error("Abscissa has {0} points but ordinate has {1}")]
    MismatchedLengths(usize, usize),
    #[error("Abscissa must be strictly increasing (index {0})")]
    UnsortedData(usize),
    #[error("Non-finite value at index {0}")]
    NonFinite(usize),
}

/// A validated, strictly increasing table of `(x, y)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl TabulatedCurve {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        if xs.len() != ys.len() {
            return Err(InterpError::MismatchedLengths(xs.len(), ys.len()));
        }
        if xs.len() < 2 {
            return Err(InterpError::InsufficientData(xs.len()));
        }
        if let Some(idx) = xs
            .iter()
            .zip(ys.iter())
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(InterpError::NonFinite(idx));
        }
        if let Some(idx) = xs.windows(2).position(|w| w[1] <= w[0]) {
            return Err(InterpError::UnsortedData(idx + 1));
        }
        Ok(Self { xs, ys })
    }

    /// Inclusive abscissa range covered by the table.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Linear interpolation at `x`; fails outside the tabulated domain.
    pub fn eval(&self, x: f64) -> Result<f64, InterpError> {
        let (lo, hi) = self.domain();
        if !(lo..=hi).contains(&x) {
            return Err(InterpError::OutOfBounds(x, lo, hi));
        }

        // partition_point gives the first abscissa strictly greater than x
        let idx = self.xs.partition_point(|&v| v <= x);
        if idx == 0 {
            return Ok(self.ys[0]);
        }
        if idx == self.xs.len() {
            return Ok(self.ys[idx - 1]);
        }

        let (x1, x2) = (self.xs[idx - 1], self.xs[idx]);
        let (y1, y2) = (self.ys[idx - 1], self.ys[idx]);
        let t = (x - x1) / (x2 - x1);
        Ok(y1 + t * (y2 - y1))
    }

    /// Linear interpolation at `x`, returning `fill` outside the domain.
    pub fn eval_or(&self, x: f64, fill: f64) -> f64 {
        self.eval(x).unwrap_or(fill)
    }

    /// Trapezoidal integral of the curve over `[a, b]` clipped to the domain.
    pub fn integrate(&self, a: f64, b: f64) -> f64 {
        let (lo, hi) = self.domain();
        let (a, b) = (a.max(lo), b.min(hi));
        if b <= a {
            return 0.0;
        }

        let mut knots = vec![a];
        knots.extend(self.xs.iter().copied().filter(|&x| x > a && x < b));
        knots.push(b);

        knots
            .windows(2)
            .map(|w| 0.5 * (self.eval_or(w[0], 0.0) + self.eval_or(w[1], 0.0)) * (w[1] - w[0]))
            .sum()
    }
}
