use log::trace;
use ndarray::{Array1, ArrayView2, Zip};
use risk_core::{AuxParam, BaseLoss, Grads, Loss, Model, Result, RiskError, tensor};

/// Mean-variance objective with a pseudo-Huber dispersion around a learned
/// location `μ` and scale `σ`:
///
/// `α·μ + β·σ + λ·(sqrt((ℓ − μ)² + σ²) − σ)`
///
/// The model must carry the `location` and `scale` auxiliary parameters. The
/// scale is never clamped: keeping it away from zero is the optimizer's job.
#[derive(Debug, Clone, PartialEq)]
pub struct MvHuber<L = BaseLoss> {
    loss: L,
    alpha: f64,
    beta: f64,
    lam: f64,
}

impl<L: Loss> MvHuber<L> {
    /// Wraps `loss` into the mean-variance objective.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidHyper` if any coefficient is not finite.
    pub fn new(loss: L, alpha: f64, beta: f64, lam: f64) -> Result<Self> {
        for (name, value) in [("alpha", alpha), ("beta", beta), ("lam", lam)] {
            if !value.is_finite() {
                return Err(RiskError::InvalidHyper {
                    name,
                    value,
                    reason: "must be finite",
                });
            }
        }
        Ok(Self {
            loss,
            alpha,
            beta,
            lam,
        })
    }

    pub fn base(&self) -> &L {
        &self.loss
    }
}

impl<L: Loss> Loss for MvHuber<L> {
    fn name(&self) -> String {
        format!("MV_Huber x {}", self.loss.name())
    }

    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        let losses = self.loss.value(model, x, y)?;
        let location = model.params().aux(AuxParam::Location)?;
        let scale = model.params().aux(AuxParam::Scale)?;

        let Self {
            alpha, beta, lam, ..
        } = *self;

        Ok(losses.mapv(|l| {
            let d = l - location;
            let dispersion = (d * d + scale * scale).sqrt() - scale;
            alpha * location + beta * scale + lam * dispersion
        }))
    }

    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads> {
        let losses = self.loss.value(model, x, y)?;
        let location = model.params().aux(AuxParam::Location)?;
        let scale = model.params().aux(AuxParam::Scale)?;
        let base = self.loss.gradient(model, x, y)?;

        let Self {
            alpha, beta, lam, ..
        } = *self;

        // ratio = (ℓ − μ) / sqrt((ℓ − μ)² + σ²)
        let denom = losses.mapv(|l| ((l - location).powi(2) + scale * scale).sqrt());
        let ratio = Zip::from(&losses)
            .and(&denom)
            .map_collect(|&l, &den| (l - location) / den);

        let dispersion_grads = ratio.mapv(|r| lam * r);
        let location_grads = ratio.mapv(|r| alpha - lam * r);
        let scale_grads = denom.mapv(|den| lam * scale / den + beta - lam);

        trace!(location = location, scale = scale; "mean-variance gradient");

        let n = losses.len();
        let mut grads = Grads::new();
        for (name, g) in &base.primary {
            tensor::check_samples(g, n, "MV-Huber base gradient")?;
            let g = tensor::scale_samples1(g, &dispersion_grads, "MV-Huber dispersion weights")?;
            grads.primary.insert(name.clone(), g);
        }
        for (&param, g) in &base.aux {
            grads.aux.insert(param, g * &dispersion_grads);
        }

        for (param, g) in [
            (AuxParam::Location, location_grads),
            (AuxParam::Scale, scale_grads),
        ] {
            grads
                .aux
                .entry(param)
                .and_modify(|acc| *acc += &g)
                .or_insert(g);
        }

        Ok(grads)
    }
}
