use ndarray::{Array1, ArrayD, ArrayView2};
use risk_core::{Directions, Grads, Loss, Model, Result, RiskError, tensor};

/// Turns per-sample gradients of a loss into one descent direction per
/// parameter.
pub trait DirectionRule<L: Loss> {
    /// Computes the direction to step along, shaped like the parameters.
    ///
    /// # Errors
    /// Returns `RiskError` if the loss or its gradient cannot be evaluated on
    /// the batch.
    fn direction(
        &self,
        model: &dyn Model,
        loss: &L,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> Result<Directions>;
}

/// Plain gradient descent: the negated sample mean of every gradient.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanGradient;

impl<L: Loss> DirectionRule<L> for MeanGradient {
    fn direction(
        &self,
        model: &dyn Model,
        loss: &L,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> Result<Directions> {
        let grads = loss.gradient(model, x, y)?;
        reduce(&grads, |g| Ok(-tensor::sample_mean(g, "gradient")?), |g| {
            Ok(-tensor::mean(g, "aux gradient")?)
        })
    }
}

/// Tilted gradient descent: samples are weighted by a softmax of
/// `tilt · loss`, so positive tilts focus on the worst samples and negative
/// tilts on the best ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tilted {
    tilt: f64,
}

impl Tilted {
    /// # Errors
    /// Returns `RiskError::InvalidHyper` unless `tilt` is finite and non-zero.
    pub fn new(tilt: f64) -> Result<Self> {
        if !tilt.is_finite() || tilt == 0.0 {
            return Err(RiskError::InvalidHyper {
                name: "tilt",
                value: tilt,
                reason: "must be finite and non-zero",
            });
        }
        Ok(Self { tilt })
    }

    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    /// Softmax of `tilt · losses`, shifted by the maximum for stability.
    pub fn weights(&self, losses: &Array1<f64>) -> Result<Array1<f64>> {
        if losses.is_empty() {
            return Err(RiskError::EmptyBatch {
                what: "tilted weights",
            });
        }

        let scaled = losses.mapv(|l| self.tilt * l);
        let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let exp = scaled.mapv(|s| (s - max).exp());
        let total = exp.sum();
        Ok(exp / total)
    }
}

impl<L: Loss> DirectionRule<L> for Tilted {
    fn direction(
        &self,
        model: &dyn Model,
        loss: &L,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> Result<Directions> {
        let losses = loss.value(model, x, y)?;
        let weights = self.weights(&losses)?;
        let grads = loss.gradient(model, x, y)?;

        reduce(
            &grads,
            |g| {
                tensor::check_samples(g, weights.len(), "tilted gradient")?;
                Ok(-tensor::weighted_sum(g, &weights, "tilted weights")?)
            },
            |g| {
                if g.len() != weights.len() {
                    return Err(RiskError::ShapeMismatch {
                        what: "tilted aux gradient",
                        got: vec![g.len()],
                        expected: vec![weights.len()],
                    });
                }
                Ok(-g.dot(&weights))
            },
        )
    }
}

/// Reduces every gradient entry with the matching closure.
pub(crate) fn reduce(
    grads: &Grads,
    mut primary: impl FnMut(&ArrayD<f64>) -> Result<ArrayD<f64>>,
    mut aux: impl FnMut(&Array1<f64>) -> Result<f64>,
) -> Result<Directions> {
    let mut dirs = Directions::new();
    for (name, g) in &grads.primary {
        dirs.primary.insert(name.clone(), primary(g)?);
    }
    for (&param, g) in &grads.aux {
        dirs.aux.insert(param, aux(g)?);
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use risk_core::{BaseLoss, LinearModel};

    #[test]
    fn mean_gradient_negates_the_average() {
        let model = LinearModel::from_weights(arr1(&[0.0]), 0.0);
        let x = arr2(&[[1.0], [3.0]]);
        let y = arr2(&[[1.0], [1.0]]);

        // quadratic: g_w = (f − y)·x = [−1, −3], g_b = [−1, −1]
        let dirs = MeanGradient
            .direction(&model, &BaseLoss::Quadratic, x.view(), y.view())
            .unwrap();

        assert_eq!(dirs.primary["w"], arr2(&[[2.0]]).into_dyn());
        assert_eq!(dirs.primary["b"], arr1(&[1.0]).into_dyn());
        assert!(dirs.aux.is_empty());
    }

    #[test]
    fn tilted_weights_sum_to_one_and_favor_large_losses() {
        let rule = Tilted::new(2.0).unwrap();
        let w = rule.weights(&arr1(&[1.0, 2.0, 1000.0])).unwrap();

        assert!((w.sum() - 1.0).abs() < 1e-12);
        assert!(w[2] > 0.999);
        assert!(w.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn vanishing_tilt_matches_mean_gradient() {
        let model = LinearModel::from_weights(arr1(&[0.5, -1.0]), 0.2);
        let x = arr2(&[[1.0, 2.0], [-1.0, 0.5], [3.0, 1.0]]);
        let y = arr2(&[[0.0], [1.0], [2.0]]);
        let loss = BaseLoss::Quadratic;

        let plain = MeanGradient.direction(&model, &loss, x.view(), y.view()).unwrap();
        let tilted = Tilted::new(1e-10)
            .unwrap()
            .direction(&model, &loss, x.view(), y.view())
            .unwrap();

        for (name, d) in &plain.primary {
            let diff = (d - &tilted.primary[name]).mapv(f64::abs);
            assert!(diff.iter().all(|&v| v < 1e-8), "{name}");
        }
    }

    #[test]
    fn degenerate_tilts_are_rejected() {
        for tilt in [0.0, f64::NAN, f64::INFINITY] {
            assert!(Tilted::new(tilt).unwrap_err().is_config_fault());
        }
    }
}
