//! Scalar statistics and sampling kernels used by the particle filter.
//!
//! Everything here is deterministic given the caller's RNG state. The engine
//! owns a single seeded [`rand::rngs::StdRng`] and threads it through the
//! sampling helpers, so two runs with the same seed draw identical sequences.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Draw a single value uniformly from `[lo, hi)`.
///
/// A degenerate interval (`hi <= lo`) collapses to `lo`.
pub fn sample_uniform<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        Uniform::new(lo, hi).sample(rng)
    } else {
        lo
    }
}

/// Draw a single value from `N(mean, std_dev^2)`.
///
/// A non-positive standard deviation collapses to the mean.
pub fn sample_gaussian<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(dist) if std_dev > 0.0 => dist.sample(rng),
        _ => mean,
    }
}

/// Slope of the least-squares line through `(ts[i], xs[i])`.
///
/// Returns 0 when fewer than two samples are available, when the series
/// lengths differ, or when all `ts` coincide (zero denominator).
pub fn linear_regression_slope(ts: &[f64], xs: &[f64]) -> f64 {
    if ts.len() < 2 || ts.len() != xs.len() {
        return 0.0;
    }

    let n = ts.len() as f64;
    let t_mean = ts.iter().sum::<f64>() / n;
    let x_mean = xs.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (t, x) in ts.iter().zip(xs.iter()) {
        let dt = t - t_mean;
        num += dt * (x - x_mean);
        den += dt * dt;
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Indices of `ws` ordered by descending value.
///
/// The sort is stable: equal values keep their original relative order, so
/// ties are broken by the lower original index.
pub fn argsort_desc(ws: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..ws.len()).collect();
    indices.sort_by(|&a, &b| {
        ws[b].partial_cmp(&ws[a]).unwrap_or(std::cmp::Ordering::Equal)
    });
    indices
}

/// Weighted arithmetic mean of `vs` under `ws`.
///
/// Falls back to the unweighted mean when the weights sum to zero, and to 0
/// for empty input. Invariant under positive rescaling of the weights.
pub fn weighted_mean(vs: &[f64], ws: &[f64]) -> f64 {
    if vs.is_empty() {
        return 0.0;
    }
    debug_assert_eq!(vs.len(), ws.len());

    let weight_sum: f64 = ws.iter().sum();
    if weight_sum == 0.0 {
        return vs.iter().sum::<f64>() / vs.len() as f64;
    }

    let acc: f64 = vs.iter().zip(ws.iter()).map(|(v, w)| v * w).sum();
    acc / weight_sum
}

/// Population standard deviation of `vs`; 0 for empty input.
pub fn std_dev(vs: &[f64]) -> f64 {
    if vs.is_empty() {
        return 0.0;
    }
    let n = vs.len() as f64;
    let mean = vs.iter().sum::<f64>() / n;
    let var = vs.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}
