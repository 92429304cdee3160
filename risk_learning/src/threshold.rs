//! Location estimates used to initialise or reset auxiliary thresholds from a
//! sample of losses.

use std::str::FromStr;

use ndarray::Array1;
use risk_core::{Dispersion, PseudoHuber, Result, RiskError, tensor};

/// Maximum number of fixed-point iterations for the M-estimate.
const MEST_MAX_ITER: usize = 50;
/// The M-estimate stops once an iteration moves it by at most this much.
const MEST_TOL: f64 = 1e-3;

/// How a scalar threshold is read off a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdSetter {
    Mean,
    Median,
    /// Pseudo-Huber M-estimate of location at scale `sigma`.
    MEstimate { sigma: f64 },
}

impl ThresholdSetter {
    /// Selects a setter by name: `"mean"`, `"median"` or `"mest"`.
    ///
    /// # Errors
    /// Returns `RiskError::MissingKeyword` if `"mest"` comes without `sigma`,
    /// `RiskError::InvalidHyper` if `sigma` is not finite and positive, and
    /// `RiskError::UnknownName` for any other name.
    pub fn from_name(name: &str, sigma: Option<f64>) -> Result<Self> {
        match name {
            "mean" => Ok(ThresholdSetter::Mean),
            "median" => Ok(ThresholdSetter::Median),
            "mest" => {
                let sigma = sigma.ok_or(RiskError::MissingKeyword {
                    what: "threshold setter mest",
                    keyword: "sigma",
                })?;
                Self::m_estimate(sigma)
            }
            other => Err(RiskError::UnknownName {
                kind: "threshold setter",
                name: other.to_string(),
            }),
        }
    }

    /// # Errors
    /// Returns `RiskError::InvalidHyper` unless `sigma` is finite and positive.
    pub fn m_estimate(sigma: f64) -> Result<Self> {
        if sigma > 0.0 && sigma.is_finite() {
            Ok(ThresholdSetter::MEstimate { sigma })
        } else {
            Err(RiskError::InvalidHyper {
                name: "sigma",
                value: sigma,
                reason: "must be finite and positive",
            })
        }
    }

    /// Computes the threshold for `sample`.
    ///
    /// # Errors
    /// Returns `RiskError::EmptyBatch` if `sample` is empty.
    pub fn apply(&self, sample: &Array1<f64>) -> Result<f64> {
        match *self {
            ThresholdSetter::Mean => tensor::mean(sample, "threshold sample"),
            ThresholdSetter::Median => median(sample),
            ThresholdSetter::MEstimate { sigma } => m_estimate(sample, sigma),
        }
    }
}

impl FromStr for ThresholdSetter {
    type Err = RiskError;

    /// Parses the names that need no extra keyword.
    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s, None)
    }
}

fn median(sample: &Array1<f64>) -> Result<f64> {
    let mut sorted = sample.to_vec();
    if sorted.is_empty() {
        return Err(RiskError::EmptyBatch {
            what: "threshold sample",
        });
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}

fn m_estimate(sample: &Array1<f64>, sigma: f64) -> Result<f64> {
    let mut theta = tensor::mean(sample, "threshold sample")?;

    for _ in 0..MEST_MAX_ITER {
        let influence = PseudoHuber.d1_array(&sample.mapv(|x| (x - theta) / sigma));
        let shift = sigma * tensor::mean(&influence, "threshold sample")?;
        theta += shift;
        if shift.abs() <= MEST_TOL {
            break;
        }
    }

    Ok(theta)
}
