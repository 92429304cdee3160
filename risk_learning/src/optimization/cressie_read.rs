use log::{debug, trace, warn};
use ndarray::{Array1, ArrayView2};
use risk_core::{AuxParam, Directions, Loss, Model, Result, tensor};

use super::direction::{DirectionRule, reduce};
use crate::risk::{DroCr, check_cressie_read};

/// Descent direction for the Cressie-Read dual objective.
///
/// Averaging the gradients of [`DroCr`] gives a direction for the dual
/// objective, not for the robust risk. This rule rescales it by the closed-form
/// normalizer linking `θ` to the divergence ball:
///
/// `scale = (1 + c(c−1)·bound)^{1/c} / (c* · mean((ℓ − θ)_+^{c*})^{1/c})`
///
/// Every primary direction is `−scale · mean(g)` and the `θ` direction is
/// `−(scale · (mean(g_θ) − 1) + 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CressieRead {
    bound: f64,
    shape: f64,
}

impl CressieRead {
    /// # Errors
    /// Returns `RiskError::InvalidShape` unless `shape > 1`, and
    /// `RiskError::InvalidHyper` unless `bound` is finite and non-negative.
    pub fn new(bound: f64, shape: f64) -> Result<Self> {
        check_cressie_read(bound, shape)?;
        Ok(Self { bound, shape })
    }

    /// The rule matching the ball of an existing loss.
    pub fn for_loss<L: Loss>(loss: &DroCr<L>) -> Self {
        Self {
            bound: loss.bound(),
            shape: loss.shape(),
        }
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// The normalizer for the given raw losses and dual variable.
    ///
    /// Infinite when every loss is at or below `θ`.
    pub fn scale(&self, losses: &Array1<f64>, theta: f64) -> Result<f64> {
        let moment = self.moment(losses, theta)?;
        Ok(self.radius() / moment.powf(1.0 / self.shape))
    }

    fn moment(&self, losses: &Array1<f64>, theta: f64) -> Result<f64> {
        let cstar = self.shape / (self.shape - 1.0);
        let excess = losses.mapv(|l| (l - theta).max(0.0).powf(cstar));
        tensor::mean(&excess, "Cressie-Read losses")
    }

    fn radius(&self) -> f64 {
        let c = self.shape;
        (1.0 + c * (c - 1.0) * self.bound).powf(1.0 / c) * (c - 1.0) / c
    }
}

impl<L: Loss> DirectionRule<DroCr<L>> for CressieRead {
    fn direction(
        &self,
        model: &dyn Model,
        loss: &DroCr<L>,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> Result<Directions> {
        let theta = model.params().aux(AuxParam::Theta)?;
        let losses = loss.base().value(model, x, y)?;
        let moment = self.moment(&losses, theta)?;
        let grads = loss.gradient(model, x, y)?;

        // Every sample is clipped: the primary gradients vanish and the
        // normalizer diverges, so take the limit and only lower θ.
        if moment == 0.0 {
            debug!(theta = theta; "all losses at or below theta");
            let mut dirs = reduce(
                &grads,
                |g| Ok(tensor::sample_mean(g, "DRO gradient")?.mapv(|_| 0.0)),
                |_| Ok(0.0),
            )?;
            if dirs.aux.contains_key(&AuxParam::Theta) {
                dirs.aux.insert(AuxParam::Theta, -1.0);
            }
            return Ok(dirs);
        }

        let scale = self.radius() / moment.powf(1.0 / self.shape);
        if !scale.is_finite() {
            warn!(theta = theta, scale = scale; "Cressie-Read normalizer is not finite");
        }
        trace!(theta = theta, scale = scale; "Cressie-Read rescaling");

        let mut dirs = reduce(
            &grads,
            |g| Ok(tensor::sample_mean(g, "DRO gradient")? * -scale),
            |g| Ok(-scale * tensor::mean(g, "DRO aux gradient")?),
        )?;

        if let Some(g) = grads.aux.get(&AuxParam::Theta) {
            let mean = tensor::mean(g, "theta gradient")?;
            dirs.aux.insert(AuxParam::Theta, -(scale * (mean - 1.0) + 1.0));
        }

        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use risk_core::{BaseLoss, LinearModel, RiskError};

    #[test]
    fn shape_at_or_below_one_is_a_config_fault() {
        for shape in [1.0, 0.5, -2.0] {
            let err = CressieRead::new(0.1, shape).unwrap_err();
            assert_eq!(err, RiskError::InvalidShape { shape });
        }
    }

    #[test]
    fn chi_square_scale_matches_closed_form() {
        // c = 2, c* = 2: scale = sqrt(1 + 2·bound) / (2 · sqrt(mean((ℓ−θ)_+²)))
        let rule = CressieRead::new(0.5, 2.0).unwrap();
        let scale = rule.scale(&arr1(&[1.0, 3.0, -1.0]), 0.0).unwrap();
        let expected = 2f64.sqrt() / (2.0 * (10.0f64 / 3.0).sqrt());
        assert!((scale - expected).abs() < 1e-12);
    }

    #[test]
    fn theta_direction_uses_the_offset_form() {
        let loss = DroCr::new(BaseLoss::Absolute, 0.0, 2.0).unwrap();
        let rule = CressieRead::for_loss(&loss);
        let model = LinearModel::from_weights(arr1(&[0.0]), 0.0).with_aux(AuxParam::Theta, 0.5);
        let x = arr2(&[[1.0], [1.0]]);
        let y = arr2(&[[1.0], [2.0]]);

        // raw losses [1, 2], excess [0.5, 1.5], mean of squares 1.25
        let scale = 1.0 / (2.0 * 1.25f64.sqrt());
        // slopes 2·excess = [1, 3], g_θ = 1 − slope = [0, −2]
        let expected = -(scale * (-1.0 - 1.0) + 1.0);

        let dirs = rule.direction(&model, &loss, x.view(), y.view()).unwrap();
        assert!((dirs.aux[&AuxParam::Theta] - expected).abs() < 1e-12);
        assert_eq!(dirs.keys(), loss.gradient(&model, x.view(), y.view()).unwrap().keys());
    }

    #[test]
    fn fully_clipped_batch_only_lowers_theta() {
        let loss = DroCr::new(BaseLoss::Quadratic, 0.5, 2.0).unwrap();
        let rule = CressieRead::for_loss(&loss);
        let model = LinearModel::from_weights(arr1(&[0.0]), 0.0).with_aux(AuxParam::Theta, 10.0);
        let x = arr2(&[[1.0], [1.0]]);
        let y = arr2(&[[0.5], [1.0]]);

        // raw losses [0.125, 0.5] sit below θ = 10
        assert!(rule.scale(&arr1(&[0.125, 0.5]), 10.0).unwrap().is_infinite());

        let dirs = rule.direction(&model, &loss, x.view(), y.view()).unwrap();
        assert_eq!(dirs.aux[&AuxParam::Theta], -1.0);
        assert!(dirs.primary.values().flatten().all(|d| *d == 0.0));
    }

    #[test]
    fn missing_theta_is_a_config_fault() {
        let loss = DroCr::new(BaseLoss::Quadratic, 0.0, 2.0).unwrap();
        let model = LinearModel::new(1);
        let x = arr2(&[[1.0]]);
        let y = arr2(&[[1.0]]);

        let err = CressieRead::for_loss(&loss)
            .direction(&model, &loss, x.view(), y.view())
            .unwrap_err();
        assert!(err.is_config_fault());
    }
}
