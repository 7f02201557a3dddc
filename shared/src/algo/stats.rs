//! Normal-distribution helpers for spectral binning and noise tests

use scilib::math::basic::erf;
use std::f64::consts::SQRT_2;
use std::ops::{Bound, RangeBounds};

/// Cumulative distribution function for standard normal distribution
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Fraction of a normal distribution `N(center, sigma)` falling in `bin`.
///
/// Used to bin a Gaussian emission line onto the wavelength grid so the
/// binned fluxes sum to the line's total flux. Unbounded ends cover the
/// tails. With `sigma <= 0` the line is a point mass, and the open or
/// closed ends of `bin` decide whether it is counted.
pub fn gaussian_bin_fraction<B: RangeBounds<f64>>(bin: B, center: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return if bin.contains(&center) { 1.0 } else { 0.0 };
    }
    let cdf_at = |bound: Bound<&f64>, unbounded: f64| match bound {
        Bound::Included(x) | Bound::Excluded(x) => normal_cdf((x - center) / sigma),
        Bound::Unbounded => unbounded,
    };
    cdf_at(bin.end_bound(), 1.0) - cdf_at(bin.start_bound(), 0.0)
}

/// Kolmogorov-Smirnov test statistic calculation
///
/// Tests if a sample comes from a normal distribution after standardizing
/// it to zero mean and unit variance. Returns the maximum difference
/// between empirical and theoretical CDFs.
pub fn ks_test_normal(residuals: &[f64]) -> f64 {
    let n = residuals.len();
    if n == 0 {
        return 1.0;
    }

    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mean: f64 = sorted.iter().sum::<f64>() / n as f64;
    let variance: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    if std_dev < 1e-10 {
        return 1.0;
    }

    sorted
        .iter()
        .enumerate()
        .map(|(i, x)| {
            let theoretical = normal_cdf((x - mean) / std_dev);
            let before = (theoretical - i as f64 / n as f64).abs();
            let after = (theoretical - (i + 1) as f64 / n as f64).abs();
            before.max(after)
        })
        .fold(0.0, f64::max)
}
