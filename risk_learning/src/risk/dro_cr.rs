use ndarray::{Array1, ArrayView2};
use risk_core::{AuxParam, BaseLoss, Grads, Loss, Model, Result, RiskError, tensor};

/// Per-sample dual objective of distributionally robust optimization over a
/// Cressie-Read divergence ball of radius `bound` and shape `c`:
///
/// `θ + (ℓ − θ)_+^{c*}`, with `c* = c / (c − 1)`
///
/// where `θ` is the model's `theta` auxiliary parameter. Plain averaging of
/// these gradients is not a descent direction for the robust risk; pair this
/// loss with the Cressie-Read direction rule, which rescales them.
#[derive(Debug, Clone, PartialEq)]
pub struct DroCr<L = BaseLoss> {
    loss: L,
    bound: f64,
    shape: f64,
    cstar: f64,
}

impl<L: Loss> DroCr<L> {
    /// Wraps `loss` into the Cressie-Read dual objective.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidShape` unless `shape > 1`, and
    /// `RiskError::InvalidHyper` unless `bound` is finite and non-negative.
    pub fn new(loss: L, bound: f64, shape: f64) -> Result<Self> {
        check_cressie_read(bound, shape)?;
        Ok(Self {
            loss,
            bound,
            shape,
            cstar: shape / (shape - 1.0),
        })
    }

    pub fn base(&self) -> &L {
        &self.loss
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// The conjugate exponent `c / (c − 1)`.
    pub fn cstar(&self) -> f64 {
        self.cstar
    }
}

/// Validates a Cressie-Read `(bound, shape)` pair.
pub(crate) fn check_cressie_read(bound: f64, shape: f64) -> Result<()> {
    if !(shape > 1.0) || !shape.is_finite() {
        return Err(RiskError::InvalidShape { shape });
    }
    if !(bound >= 0.0) || !bound.is_finite() {
        return Err(RiskError::InvalidHyper {
            name: "bound",
            value: bound,
            reason: "must be finite and non-negative",
        });
    }
    Ok(())
}

/// Maps the user-facing robustness level `atilde` to `(bound, shape)`.
///
/// The shape is fixed at `2` (the χ² ball) and the radius is
/// `((1 / (1 − atilde)) − 1)² / 2`.
///
/// # Errors
/// Returns `RiskError::InvalidHyper` unless `0 <= atilde < 1`.
pub fn parse_dro(atilde: f64) -> Result<(f64, f64)> {
    if !(0.0..1.0).contains(&atilde) {
        return Err(RiskError::InvalidHyper {
            name: "atilde",
            value: atilde,
            reason: "must lie in [0, 1)",
        });
    }
    let shape = 2.0;
    let bound = ((1.0 / (1.0 - atilde)) - 1.0).powi(2) / 2.0;
    Ok((bound, shape))
}

impl<L: Loss> Loss for DroCr<L> {
    fn name(&self) -> String {
        format!("DRO_CR x {}", self.loss.name())
    }

    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        let losses = self.loss.value(model, x, y)?;
        let theta = model.params().aux(AuxParam::Theta)?;
        let cstar = self.cstar;
        Ok(losses.mapv(|l| theta + (l - theta).max(0.0).powf(cstar)))
    }

    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads> {
        let losses = self.loss.value(model, x, y)?;
        let theta = model.params().aux(AuxParam::Theta)?;
        let base = self.loss.gradient(model, x, y)?;
        let cstar = self.cstar;

        // d/dℓ (ℓ − θ)_+^{c*}
        let slope = losses.mapv(|l| cstar * (l - theta).max(0.0).powf(cstar - 1.0));

        let n = losses.len();
        let mut grads = Grads::new();
        for (name, g) in &base.primary {
            tensor::check_samples(g, n, "DRO base gradient")?;
            let g = tensor::scale_samples1(g, &slope, "DRO slope weights")?;
            grads.primary.insert(name.clone(), g);
        }
        for (&param, g) in &base.aux {
            grads.aux.insert(param, g * &slope);
        }

        let theta_grads = slope.mapv(|s| 1.0 - s);
        grads
            .aux
            .entry(AuxParam::Theta)
            .and_modify(|acc| *acc += &theta_grads)
            .or_insert(theta_grads);

        Ok(grads)
    }
}
