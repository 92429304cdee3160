use ndarray::{Array1, ArrayView2};

use super::{chain_rule, residuals, Loss};
use crate::{
    error::{Result, RiskError},
    model::Model,
    params::Grads,
    tensor::sign,
};

/// The regression loss `|f − y|^p / p`, which reduces to `|f − y|` at `p = 1`.
///
/// At a zero residual with `p = 1` the subgradient used is `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvexPolynomial {
    exponent: f64,
}

impl ConvexPolynomial {
    /// Returns a new `ConvexPolynomial` loss.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidExponent` unless `exponent >= 1.0`; below one
    /// the loss is not convex.
    pub fn new(exponent: f64) -> Result<Self> {
        if !(exponent >= 1.0) || !exponent.is_finite() {
            return Err(RiskError::InvalidExponent { exponent });
        }
        Ok(Self { exponent })
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }
}

impl Loss for ConvexPolynomial {
    fn name(&self) -> String {
        format!("convex_polynomial(p={})", self.exponent)
    }

    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        let abs_diffs = residuals(model, x, y)?.mapv(f64::abs);
        if self.exponent == 1.0 {
            return Ok(abs_diffs);
        }

        let p = self.exponent;
        Ok(abs_diffs.mapv(|d| d.powf(p) / p))
    }

    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads> {
        let diffs = residuals(model, x, y)?;
        let p = self.exponent;

        let factors = if p == 1.0 {
            diffs.mapv(sign)
        } else {
            diffs.mapv(|d| d.abs().powf(p - 1.0) * sign(d))
        };

        chain_rule(model, x, &factors)
    }
}
