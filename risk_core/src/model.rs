use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayD, ArrayView2, Axis, Ix2, IxDyn};

use crate::{
    error::{Result, RiskError},
    params::{AuxParam, Params},
};

/// A parametric predictor.
///
/// A `Model` owns its parameters and knows how to evaluate itself and how its
/// outputs move with each primary parameter. It does not:
/// - compute losses,
/// - decide how parameters are updated,
/// - iterate over datasets.
pub trait Model {
    /// Read access to every parameter, primary and auxiliary.
    fn params(&self) -> &Params;

    /// Write access to every parameter; used by algorithms to apply steps.
    fn params_mut(&mut self) -> &mut Params;

    /// Computes the model output for a batch `x` of shape `(n, d)`.
    ///
    /// # Errors
    /// Returns `RiskError` if `x` does not fit the parameters.
    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Returns, per primary parameter, the derivative of each sample's output
    /// with respect to that parameter, shaped `(n, *param_shape)`.
    ///
    /// # Errors
    /// Returns `RiskError` if `x` does not fit the parameters.
    fn jacobian(&self, x: ArrayView2<f64>) -> Result<BTreeMap<String, ArrayD<f64>>>;
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn params(&self) -> &Params {
        (**self).params()
    }

    fn params_mut(&mut self) -> &mut Params {
        (**self).params_mut()
    }

    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        (**self).evaluate(x)
    }

    fn jacobian(&self, x: ArrayView2<f64>) -> Result<BTreeMap<String, ArrayD<f64>>> {
        (**self).jacobian(x)
    }
}

impl<M: Model + ?Sized> Model for &mut M {
    fn params(&self) -> &Params {
        (**self).params()
    }

    fn params_mut(&mut self) -> &mut Params {
        (**self).params_mut()
    }

    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        (**self).evaluate(x)
    }

    fn jacobian(&self, x: ArrayView2<f64>) -> Result<BTreeMap<String, ArrayD<f64>>> {
        (**self).jacobian(x)
    }
}

/// Single-output linear predictor `f(x) = x·w + b`.
///
/// Primary parameters are `w` with shape `(d, 1)` and `b` with shape `(1,)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    params: Params,
}

impl LinearModel {
    pub const WEIGHTS: &'static str = "w";
    pub const BIAS: &'static str = "b";

    /// Returns a zero-initialized `LinearModel` for `n_features` inputs.
    pub fn new(n_features: usize) -> Self {
        Self::from_weights(Array1::zeros(n_features), 0.0)
    }

    /// Returns a `LinearModel` with the given weights and bias.
    pub fn from_weights(w: Array1<f64>, b: f64) -> Self {
        let params = Params::new()
            .with_primary(Self::WEIGHTS, w.insert_axis(Axis(1)).into_dyn())
            .with_primary(Self::BIAS, Array1::from_elem(1, b).into_dyn());
        Self { params }
    }

    /// Attaches an auxiliary risk parameter, builder style.
    pub fn with_aux(mut self, param: AuxParam, value: f64) -> Self {
        self.params.set_aux(param, value);
        self
    }

    pub fn n_features(&self) -> usize {
        self.params.primary(Self::WEIGHTS).map_or(0, |w| w.len())
    }

    fn weights(&self) -> Result<ArrayView2<'_, f64>> {
        let w = self.params.primary(Self::WEIGHTS).ok_or(RiskError::MissingParam {
            name: Self::WEIGHTS.into(),
        })?;

        w.view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| RiskError::ShapeMismatch {
                what: "linear weights",
                got: w.shape().to_vec(),
                expected: vec![w.len(), 1],
            })
    }

    fn bias(&self) -> Result<f64> {
        let b = self.params.primary(Self::BIAS).ok_or(RiskError::MissingParam {
            name: Self::BIAS.into(),
        })?;

        match b.shape() {
            [1] => Ok(b[[0]]),
            other => Err(RiskError::ShapeMismatch {
                what: "linear bias",
                got: other.to_vec(),
                expected: vec![1],
            }),
        }
    }

    fn check_input(&self, x: &ArrayView2<f64>) -> Result<()> {
        let d = self.n_features();
        if x.ncols() != d {
            return Err(RiskError::ShapeMismatch {
                what: "linear model input",
                got: x.shape().to_vec(),
                expected: vec![x.nrows(), d],
            });
        }
        Ok(())
    }
}

impl Model for LinearModel {
    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_input(&x)?;
        let w = self.weights()?;
        let b = self.bias()?;
        Ok(x.dot(&w) + b)
    }

    fn jacobian(&self, x: ArrayView2<f64>) -> Result<BTreeMap<String, ArrayD<f64>>> {
        self.check_input(&x)?;

        let mut jac = BTreeMap::new();
        jac.insert(
            Self::WEIGHTS.to_string(),
            x.to_owned().insert_axis(Axis(2)).into_dyn(),
        );
        jac.insert(
            Self::BIAS.to_string(),
            ArrayD::ones(IxDyn(&[x.nrows(), 1])),
        );
        Ok(jac)
    }
}
