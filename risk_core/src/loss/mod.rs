mod base;
mod convex_polynomial;

pub use base::BaseLoss;
pub use convex_polynomial::ConvexPolynomial;

use ndarray::{Array1, ArrayView2};

use crate::{
    error::{Result, RiskError},
    model::Model,
    params::Grads,
    tensor,
};

/// A pointwise loss over a batch.
///
/// Implementors return one value per sample; reducing over the batch is the
/// caller's business. Gradients are freshly allocated and keyed by parameter,
/// with the sample axis first in every entry.
pub trait Loss {
    /// Human-readable name, e.g. `"MV_Huber x quadratic"`.
    fn name(&self) -> String;

    /// Per-sample loss values, shape `(n,)`.
    ///
    /// # Errors
    /// Returns `RiskError` if the batch does not fit the model or the loss.
    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Per-sample gradients with respect to every parameter the loss depends on.
    ///
    /// # Errors
    /// Returns `RiskError` if the batch does not fit the model or the loss.
    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads>;
}

/// Evaluates a single-output model and returns `(model(x), y)` as column vectors.
pub(crate) fn outputs(
    model: &dyn Model,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let out = model.evaluate(x)?;
    if out.shape() != y.shape() {
        return Err(RiskError::ShapeMismatch {
            what: "targets",
            got: y.shape().to_vec(),
            expected: out.shape().to_vec(),
        });
    }

    let out = tensor::single_column(out)?;
    let y = tensor::single_column(y.to_owned())?;
    Ok((out, y))
}

/// Returns `model(x) − y` for a single-output model.
pub(crate) fn residuals(model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
    let (out, y) = outputs(model, x, y)?;
    Ok(out - y)
}

/// Chain rule for pointwise losses: scales the model Jacobian by `dℓ/df` per sample.
pub(crate) fn chain_rule(model: &dyn Model, x: ArrayView2<f64>, factors: &Array1<f64>) -> Result<Grads> {
    let mut grads = Grads::new();
    for (name, jac) in model.jacobian(x)? {
        let g = tensor::scale_samples1(&jac, factors, "model jacobian")?;
        grads.primary.insert(name, g);
    }
    Ok(grads)
}
