use ndarray::{Array1, ArrayView2, Zip};

use super::{chain_rule, outputs, residuals, ConvexPolynomial, Loss};
use crate::{
    error::{Result, RiskError},
    model::Model,
    params::Grads,
    tensor::sign,
};

/// The elementary pointwise losses a risk functional can wrap.
///
/// All of them expect a single-output model and targets of shape `(n, 1)`.
/// Classification losses read the model output as a logit and the target as a
/// label in `{0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseLoss {
    /// `|f − y|`.
    Absolute,
    /// `(f − y)² / 2`.
    Quadratic,
    /// Binary cross-entropy on logits.
    Logistic,
    /// Misclassification indicator; has no gradient.
    ZeroOne,
    /// `|f − y|^p / p`.
    ConvexPolynomial(ConvexPolynomial),
}

impl BaseLoss {
    /// Looks up one of the named elementary losses.
    ///
    /// # Errors
    /// Returns `RiskError::UnknownName` for anything else.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "absolute" => Ok(BaseLoss::Absolute),
            "quadratic" => Ok(BaseLoss::Quadratic),
            "logistic" => Ok(BaseLoss::Logistic),
            "zeroone" => Ok(BaseLoss::ZeroOne),
            other => Err(RiskError::UnknownName {
                kind: "loss",
                name: other.to_string(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BaseLoss::Absolute => "absolute",
            BaseLoss::Quadratic => "quadratic",
            BaseLoss::Logistic => "logistic",
            BaseLoss::ZeroOne => "zeroone",
            BaseLoss::ConvexPolynomial(_) => "convex_polynomial",
        }
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Loss for BaseLoss {
    fn name(&self) -> String {
        self.label().to_string()
    }

    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        match self {
            BaseLoss::Absolute => Ok(residuals(model, x, y)?.mapv(f64::abs)),
            BaseLoss::Quadratic => Ok(residuals(model, x, y)?.mapv(|r| 0.5 * r * r)),
            BaseLoss::Logistic => {
                let (f, y) = outputs(model, x, y)?;
                Ok(Zip::from(&f)
                    .and(&y)
                    .map_collect(|&f, &y| f.max(0.0) - f * y + (-f.abs()).exp().ln_1p()))
            }
            BaseLoss::ZeroOne => {
                let (f, y) = outputs(model, x, y)?;
                Ok(Zip::from(&f)
                    .and(&y)
                    .map_collect(|&f, &y| if (f > 0.0) != (y > 0.5) { 1.0 } else { 0.0 }))
            }
            BaseLoss::ConvexPolynomial(inner) => inner.value(model, x, y),
        }
    }

    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads> {
        match self {
            BaseLoss::Absolute => {
                let factors = residuals(model, x, y)?.mapv(sign);
                chain_rule(model, x, &factors)
            }
            BaseLoss::Quadratic => {
                let factors = residuals(model, x, y)?;
                chain_rule(model, x, &factors)
            }
            BaseLoss::Logistic => {
                let (f, y) = outputs(model, x, y)?;
                let factors = Zip::from(&f).and(&y).map_collect(|&f, &y| sigmoid(f) - y);
                chain_rule(model, x, &factors)
            }
            BaseLoss::ZeroOne => Err(RiskError::NotDifferentiable { loss: "zeroone" }),
            BaseLoss::ConvexPolynomial(inner) => inner.gradient(model, x, y),
        }
    }
}
