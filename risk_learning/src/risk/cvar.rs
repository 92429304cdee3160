use ndarray::{Array1, ArrayView2};
use risk_core::{AuxParam, BaseLoss, Grads, Loss, Model, Result, RiskError, tensor};

/// Conditional value-at-risk at level `alpha` in its Rockafellar-Uryasev form:
///
/// `v + max(ℓ − v, 0) / alpha`
///
/// where `v` is the model's `threshold` auxiliary parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Cvar<L = BaseLoss> {
    loss: L,
    alpha: f64,
}

impl<L: Loss> Cvar<L> {
    /// Wraps `loss` into a CVaR objective over the upper `alpha` tail.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidHyper` unless `0 < alpha <= 1`.
    pub fn new(loss: L, alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(RiskError::InvalidHyper {
                name: "alpha",
                value: alpha,
                reason: "must lie in (0, 1]",
            });
        }
        Ok(Self { loss, alpha })
    }

    /// Builds the CVaR objective from the probability level `prob`, i.e. `alpha = 1 − prob`.
    pub fn from_prob(loss: L, prob: f64) -> Result<Self> {
        Self::new(loss, 1.0 - prob)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn base(&self) -> &L {
        &self.loss
    }
}

impl<L: Loss> Loss for Cvar<L> {
    fn name(&self) -> String {
        format!("CVaR x {}", self.loss.name())
    }

    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        let losses = self.loss.value(model, x, y)?;
        let v = model.params().aux(AuxParam::Threshold)?;
        let alpha = self.alpha;
        Ok(losses.mapv(|l| v + (l - v).max(0.0) / alpha))
    }

    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads> {
        let losses = self.loss.value(model, x, y)?;
        let v = model.params().aux(AuxParam::Threshold)?;
        let base = self.loss.gradient(model, x, y)?;
        let alpha = self.alpha;

        let tail = losses.mapv(|l| if l > v { 1.0 / alpha } else { 0.0 });

        let n = losses.len();
        let mut grads = Grads::new();
        for (name, g) in &base.primary {
            tensor::check_samples(g, n, "CVaR base gradient")?;
            let g = tensor::scale_samples1(g, &tail, "CVaR tail weights")?;
            grads.primary.insert(name.clone(), g);
        }
        for (&param, g) in &base.aux {
            grads.aux.insert(param, g * &tail);
        }

        let threshold_grads = tail.mapv(|t| 1.0 - t);
        grads
            .aux
            .entry(AuxParam::Threshold)
            .and_modify(|acc| *acc += &threshold_grads)
            .or_insert(threshold_grads);

        Ok(grads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use risk_core::LinearModel;

    #[test]
    fn alpha_must_be_a_tail_probability() {
        assert!(Cvar::new(BaseLoss::Absolute, 0.0).is_err());
        assert!(Cvar::new(BaseLoss::Absolute, 1.5).is_err());
        assert!(Cvar::new(BaseLoss::Absolute, f64::NAN).is_err());
        let cvar = Cvar::from_prob(BaseLoss::Absolute, 0.95).unwrap();
        assert!((cvar.alpha() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn only_the_tail_receives_gradient() {
        let model = LinearModel::from_weights(arr1(&[1.0]), 0.0).with_aux(AuxParam::Threshold, 1.0);
        let x = arr2(&[[0.5], [3.0], [-2.0]]);
        let y = arr2(&[[0.0], [0.0], [0.0]]);
        let cvar = Cvar::new(BaseLoss::Absolute, 0.5).unwrap();

        let v = cvar.value(&model, x.view(), y.view()).unwrap();
        assert_eq!(v, arr1(&[1.0, 1.0 + 2.0 / 0.5, 1.0 + 1.0 / 0.5]));

        let g = cvar.gradient(&model, x.view(), y.view()).unwrap();
        assert_eq!(g.aux[&AuxParam::Threshold], arr1(&[1.0, -1.0, -1.0]));
        let gb: Vec<f64> = g.primary["b"].iter().copied().collect();
        assert_eq!(gb, vec![0.0, 2.0, -2.0]);
    }

    #[test]
    fn unit_alpha_with_low_threshold_is_the_mean() {
        let model = LinearModel::from_weights(arr1(&[2.0]), 1.0).with_aux(AuxParam::Threshold, -10.0);
        let x = arr2(&[[0.5], [1.0]]);
        let y = arr2(&[[0.0], [1.0]]);
        let cvar = Cvar::new(BaseLoss::Quadratic, 1.0).unwrap();
        let base = BaseLoss::Quadratic.value(&model, x.view(), y.view()).unwrap();
        let v = cvar.value(&model, x.view(), y.view()).unwrap();
        for (a, b) in base.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
