use log::debug;
use risk_core::{Model, Params, Result, RiskError};

/// Running uniform average of another model's primary parameters.
///
/// The main model is owned here and never receives gradient steps. Each call
/// to [`update`](Self::update) reads the ancillary model's parameters, which a
/// separate algorithm keeps writing, and folds them into the average.
#[derive(Debug, Clone)]
pub struct WeightedAverage<M> {
    model: M,
    weight_sum: f64,
}

impl<M: Model> WeightedAverage<M> {
    /// Returns a `WeightedAverage` whose current parameters already count as
    /// one observation, which is the case when `model_main` starts as a copy
    /// of the ancillary model.
    pub fn new(model_main: M) -> Self {
        Self {
            model: model_main,
            weight_sum: 1.0,
        }
    }

    /// Returns a `WeightedAverage` that ignores the main model's starting
    /// values: the first update overwrites them.
    pub fn from_scratch(model_main: M) -> Self {
        Self {
            model: model_main,
            weight_sum: 0.0,
        }
    }

    /// Folds the ancillary parameters into the average:
    /// `p ← (p·w + p_ancillary) / (w + 1)`, then `w ← w + 1`.
    ///
    /// Auxiliary risk parameters are not averaged.
    ///
    /// # Errors
    /// Returns `RiskError::MissingParam` or `RiskError::ShapeMismatch` if the
    /// ancillary parameters do not cover every primary parameter of the main
    /// model; nothing is modified in that case.
    pub fn update(&mut self, ancillary: &Params) -> Result<()> {
        for (name, p) in self.model.params().primaries() {
            let a = ancillary
                .primary(name)
                .ok_or_else(|| RiskError::MissingParam { name: name.into() })?;

            if a.shape() != p.shape() {
                return Err(RiskError::ShapeMismatch {
                    what: "ancillary parameter",
                    got: a.shape().to_vec(),
                    expected: p.shape().to_vec(),
                });
            }
        }

        let w = self.weight_sum;
        for (name, p) in self.model.params_mut().primaries_mut() {
            if let Some(a) = ancillary.primary(name) {
                p.zip_mut_with(a, |p, &a| *p = (*p * w + a) / (w + 1.0));
            }
        }
        self.weight_sum += 1.0;
        debug!(weight_sum = self.weight_sum; "weighted average update");

        Ok(())
    }

    /// Number of observations folded in so far.
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use risk_core::{AuxParam, LinearModel};

    fn weights(model: &LinearModel) -> Vec<f64> {
        model.params().primary("w").unwrap().iter().copied().collect()
    }

    #[test]
    fn averages_the_observed_trajectory() {
        let mut avg = WeightedAverage::from_scratch(LinearModel::new(1));

        for v in [2.0, 4.0, 6.0] {
            let ancillary = LinearModel::from_weights(arr1(&[v]), v);
            avg.update(ancillary.params()).unwrap();
        }

        assert_eq!(weights(avg.model()), vec![4.0]);
        assert_eq!(avg.weight_sum(), 3.0);
    }

    #[test]
    fn initial_state_counts_as_first_observation() {
        let mut ancillary = LinearModel::from_weights(arr1(&[2.0, -2.0]), 0.0);
        let mut avg = WeightedAverage::new(ancillary.clone());

        for v in [4.0, 6.0] {
            ancillary = LinearModel::from_weights(arr1(&[v, -v]), 0.0);
            avg.update(ancillary.params()).unwrap();
        }

        assert_eq!(weights(avg.model()), vec![4.0, -4.0]);
        assert_eq!(avg.weight_sum(), 3.0);
    }

    #[test]
    fn auxiliary_parameters_are_left_alone() {
        let main = LinearModel::new(1).with_aux(AuxParam::Theta, 1.0);
        let ancillary = LinearModel::new(1).with_aux(AuxParam::Theta, 5.0);
        let mut avg = WeightedAverage::new(main);

        avg.update(ancillary.params()).unwrap();
        assert_eq!(avg.model().params().aux(AuxParam::Theta).unwrap(), 1.0);
    }

    #[test]
    fn mismatched_ancillary_is_rejected_without_mutation() {
        let main = LinearModel::from_weights(arr1(&[1.0]), 1.0);
        let mut avg = WeightedAverage::new(main.clone());
        let wider = LinearModel::from_weights(arr1(&[3.0, 3.0]), 3.0);

        let err = avg.update(wider.params()).unwrap_err();
        assert!(err.is_shape_fault());
        assert_eq!(avg.model(), &main);
        assert_eq!(avg.weight_sum(), 1.0);
    }
}
