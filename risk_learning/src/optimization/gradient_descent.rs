use log::{debug, trace};
use ndarray::ArrayView2;
use risk_core::{Directions, Loss, Model, Result};

use super::{
    Algorithm,
    cressie_read::CressieRead,
    direction::{DirectionRule, MeanGradient, Tilted},
    step_size::StepSize,
};
use crate::risk::DroCr;

/// Gradient descent over a model it owns.
///
/// Each update asks the direction rule `R` for a direction, scales it by the
/// current step coefficient and adds it to the model's parameters in place.
#[derive(Debug)]
pub struct GradientDescent<M, L, R = MeanGradient> {
    model: M,
    loss: L,
    rule: R,
    step_size: StepSize,
    iteration: usize,
}

impl<M: Model, L: Loss> GradientDescent<M, L, MeanGradient> {
    /// Returns a new plain (empirical risk) `GradientDescent`.
    ///
    /// # Arguments
    /// * `step_size` - The step coefficient schedule.
    /// * `model` - The model whose parameters are trained.
    /// * `loss` - The loss whose mean is minimized.
    pub fn erm(step_size: StepSize, model: M, loss: L) -> Self {
        Self::new(step_size, model, loss, MeanGradient)
    }
}

impl<M: Model, L: Loss> GradientDescent<M, L, Tilted> {
    /// Returns a `GradientDescent` that follows softmax-tilted gradients.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidHyper` if `tilt` is zero or not finite.
    pub fn tilted(tilt: f64, step_size: StepSize, model: M, loss: L) -> Result<Self> {
        Ok(Self::new(step_size, model, loss, Tilted::new(tilt)?))
    }
}

impl<M: Model, L: Loss> GradientDescent<M, DroCr<L>, CressieRead> {
    /// Returns a `GradientDescent` for the Cressie-Read dual objective, with
    /// the rescaling rule matched to the loss's divergence ball.
    pub fn dro_cr(step_size: StepSize, model: M, loss: DroCr<L>) -> Self {
        let rule = CressieRead::for_loss(&loss);
        Self::new(step_size, model, loss, rule)
    }
}

impl<M: Model, L: Loss, R: DirectionRule<L>> GradientDescent<M, L, R> {
    /// Returns a new `GradientDescent` with an explicit direction rule.
    pub fn new(step_size: StepSize, model: M, loss: L, rule: R) -> Self {
        Self {
            model,
            loss,
            rule,
            step_size,
            iteration: 0,
        }
    }

    /// The direction the next update would take, without applying it.
    ///
    /// # Errors
    /// Returns `RiskError` if the direction rule fails on the batch.
    pub fn direction(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Directions> {
        self.rule.direction(&self.model, &self.loss, x, y)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn loss(&self) -> &L {
        &self.loss
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Number of updates applied so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl<M: Model, L: Loss, R: DirectionRule<L>> Algorithm for GradientDescent<M, L, R> {
    fn update(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        let dirs = self.direction(x, y)?;
        let step = self.step_size.at(self.iteration);

        for (name, d) in &dirs.primary {
            let norm = d.iter().map(|v| v * v).sum::<f64>().sqrt();
            trace!(param = name.as_str(), norm = norm; "descent direction");
        }

        self.model.params_mut().apply(&dirs, step)?;
        debug!(iteration = self.iteration, step = step; "gradient descent update");
        self.iteration += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use risk_core::{AuxParam, BaseLoss, LinearModel};

    #[test]
    fn update_steps_along_the_negative_mean_gradient() {
        let model = LinearModel::from_weights(arr1(&[0.0]), 0.0);
        let mut gd = GradientDescent::erm(StepSize::constant(0.5).unwrap(), model, BaseLoss::Quadratic);
        let x = arr2(&[[1.0], [3.0]]);
        let y = arr2(&[[1.0], [1.0]]);

        gd.update(x.view(), y.view()).unwrap();

        let params = gd.model().params();
        assert_eq!(params.primary("w").unwrap(), &arr2(&[[1.0]]).into_dyn());
        assert_eq!(params.primary("b").unwrap(), &arr1(&[0.5]).into_dyn());
        assert_eq!(gd.iteration(), 1);
    }

    #[test]
    fn failed_update_leaves_the_model_untouched() {
        let model = LinearModel::from_weights(arr1(&[0.3, 0.1]), 0.2);
        let before = model.clone();
        let mut gd = GradientDescent::erm(StepSize::constant(0.1).unwrap(), model, BaseLoss::ZeroOne);
        let x = arr2(&[[1.0, 0.0]]);
        let y = arr2(&[[1.0]]);

        assert!(gd.update(x.view(), y.view()).is_err());
        assert_eq!(gd.model(), &before);
        assert_eq!(gd.iteration(), 0);
    }

    #[test]
    fn schedules_use_the_iteration_count() {
        let model = LinearModel::from_weights(arr1(&[0.0]), 0.0);
        let mut gd = GradientDescent::erm(StepSize::inverse_time(1.0).unwrap(), model, BaseLoss::Absolute);
        let x = arr2(&[[0.0]]);
        let y = arr2(&[[10.0]]);

        // absolute loss: the bias moves by step · 1 each update
        gd.update(x.view(), y.view()).unwrap();
        gd.update(x.view(), y.view()).unwrap();

        let b = gd.into_model().params().primary("b").unwrap()[[0]];
        assert!((b - 1.5).abs() < 1e-12);
    }

    #[test]
    fn dro_update_with_theta_above_every_loss_stays_finite() {
        let model = LinearModel::from_weights(arr1(&[0.0]), 0.0).with_aux(AuxParam::Theta, 10.0);
        let loss = DroCr::new(BaseLoss::Quadratic, 0.5, 2.0).unwrap();
        let mut gd = GradientDescent::dro_cr(StepSize::constant(0.5).unwrap(), model, loss);
        let x = arr2(&[[1.0], [1.0]]);
        let y = arr2(&[[0.5], [1.0]]);

        gd.update(x.view(), y.view()).unwrap();

        let params = gd.model().params();
        assert_eq!(params.primary("w").unwrap(), &arr2(&[[0.0]]).into_dyn());
        assert_eq!(params.primary("b").unwrap(), &arr1(&[0.0]).into_dyn());
        assert_eq!(params.aux(AuxParam::Theta).unwrap(), 9.5);
    }
}
