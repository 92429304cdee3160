//! Explicit rank and broadcasting rules for per-sample tensors.
//!
//! Every per-sample tensor carries the sample axis first. Factors that scale
//! a gradient are expanded with trailing unit axes until they match the
//! gradient's rank; a factor with more axes than the gradient is a shape fault,
//! never a silent broadcast.

use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis};

use crate::error::{Result, RiskError};

/// Appends trailing unit axes to `a` until it has exactly `rank` axes.
///
/// # Errors
/// Returns `RiskError::RankMismatch` if `a` already has more than `rank` axes.
pub fn expand_trailing(mut a: ArrayD<f64>, rank: usize, what: &'static str) -> Result<ArrayD<f64>> {
    if a.ndim() > rank {
        return Err(RiskError::RankMismatch {
            what,
            got: a.ndim(),
            max: rank,
        });
    }

    while a.ndim() < rank {
        let last = a.ndim();
        a = a.insert_axis(Axis(last));
    }

    Ok(a)
}

/// Multiplies the per-sample gradient `g` by the per-sample `factor`, returning a
/// freshly allocated tensor shaped like `g`.
///
/// # Errors
/// Returns `RiskError::RankMismatch` if `factor` has more axes than `g` and
/// `RiskError::ShapeMismatch` if the expanded factor does not broadcast into `g`.
pub fn scale_samples(
    g: &ArrayD<f64>,
    factor: ArrayViewD<f64>,
    what: &'static str,
) -> Result<ArrayD<f64>> {
    let factor = expand_trailing(factor.to_owned(), g.ndim(), what)?;

    let fits = factor
        .shape()
        .iter()
        .zip(g.shape())
        .enumerate()
        .all(|(axis, (&f, &n))| f == n || (axis > 0 && f == 1));

    if !fits {
        return Err(RiskError::ShapeMismatch {
            what,
            got: factor.shape().to_vec(),
            expected: g.shape().to_vec(),
        });
    }

    Ok(g * &factor)
}

/// Same as [`scale_samples`] for the common case of one scalar factor per sample.
pub fn scale_samples1(g: &ArrayD<f64>, factor: &Array1<f64>, what: &'static str) -> Result<ArrayD<f64>> {
    scale_samples(g, factor.view().into_dyn(), what)
}

/// Averages a per-sample tensor over its sample axis.
///
/// # Errors
/// Returns `RiskError::EmptyBatch` if there is no sample axis or no samples.
pub fn sample_mean(g: &ArrayD<f64>, what: &'static str) -> Result<ArrayD<f64>> {
    if g.ndim() == 0 {
        return Err(RiskError::EmptyBatch { what });
    }
    g.mean_axis(Axis(0)).ok_or(RiskError::EmptyBatch { what })
}

/// Computes `Σ_i w_i · g_i` over the sample axis.
pub fn weighted_sum(g: &ArrayD<f64>, weights: &Array1<f64>, what: &'static str) -> Result<ArrayD<f64>> {
    Ok(scale_samples1(g, weights, what)?.sum_axis(Axis(0)))
}

/// Mean of a per-sample vector.
pub fn mean(a: &Array1<f64>, what: &'static str) -> Result<f64> {
    a.mean().ok_or(RiskError::EmptyBatch { what })
}

/// Sign with `sign(0) = 0`, which is the subgradient convention used at kinks.
#[inline]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x * 0.0
    }
}

/// Collapses a `(n, 1)` residual matrix into its single column.
///
/// # Errors
/// Returns `RiskError::NotSingleOutput` for any other shape.
pub fn single_column(a: Array2<f64>) -> Result<Array1<f64>> {
    if a.ncols() != 1 {
        return Err(RiskError::NotSingleOutput {
            shape: a.shape().to_vec(),
        });
    }
    Ok(a.column(0).to_owned())
}

/// Checks that a per-sample tensor covers `n` samples.
pub fn check_samples(g: &ArrayD<f64>, n: usize, what: &'static str) -> Result<()> {
    match g.shape().first() {
        Some(&m) if m == n => Ok(()),
        _ => Err(RiskError::ShapeMismatch {
            what,
            got: g.shape().to_vec(),
            expected: vec![n],
        }),
    }
}
