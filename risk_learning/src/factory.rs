//! Name-based selection of losses and algorithms.
//!
//! Every name is resolved into a closed enum before anything is built, so an
//! unknown name is reported without touching the models handed in.

use std::str::FromStr;

use log::info;
use ndarray::ArrayView2;
use risk_core::{BaseLoss, ConvexPolynomial, Loss, Model, Result, RiskError};

use crate::{
    config::{AlgoConfig, RiskConfig},
    optimization::{Algorithm, CressieRead, GradientDescent, Tilted, WeightedAverage},
    risk::{Cvar, DroCr, MvHuber, RiskLoss, parse_dro},
};

/// Looks up a base loss, including `convex_polynomial` which needs `exponent`.
///
/// # Errors
/// Returns `RiskError::UnknownName` for unknown names,
/// `RiskError::MissingKeyword` for `convex_polynomial` without an exponent and
/// `RiskError::InvalidExponent` for exponents below one.
pub fn base_loss(name: &str, exponent: Option<f64>) -> Result<BaseLoss> {
    if name == "convex_polynomial" {
        let exponent = exponent.ok_or(RiskError::MissingKeyword {
            what: "loss convex_polynomial",
            keyword: "exponent",
        })?;
        return Ok(BaseLoss::ConvexPolynomial(ConvexPolynomial::new(exponent)?));
    }
    BaseLoss::from_name(name)
}

/// Returns the base loss named `loss_name` and the composite loss estimating
/// the risk described by `risk`.
///
/// # Errors
/// Returns `RiskError` if the loss name is unknown or the risk
/// hyperparameters are out of range.
pub fn get_loss(loss_name: &str, risk: &RiskConfig) -> Result<(BaseLoss, RiskLoss)> {
    wrap_loss(base_loss(loss_name, None)?, risk)
}

/// Same as [`get_loss`] for an already selected base loss.
pub fn wrap_loss(base: BaseLoss, risk: &RiskConfig) -> Result<(BaseLoss, RiskLoss)> {
    let loss = match *risk {
        RiskConfig::Erm | RiskConfig::Entropic { .. } => RiskLoss::Erm(base),
        RiskConfig::MvHuber { alpha, beta, lam } => RiskLoss::MvHuber(MvHuber::new(base, alpha, beta, lam)?),
        RiskConfig::Cvar { prob } => RiskLoss::Cvar(Cvar::from_prob(base, prob)?),
        RiskConfig::Dro { atilde } => {
            let (bound, shape) = parse_dro(atilde)?;
            RiskLoss::DroCr(DroCr::new(base, bound, shape)?)
        }
    };

    info!(risk = risk.name(); "selected loss {}", loss.name());
    Ok((base, loss))
}

/// Names accepted for the ancillary algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoKind {
    /// Stochastic gradient descent, specialised by the risk.
    Sgd,
}

impl FromStr for AlgoKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SGD" => Ok(AlgoKind::Sgd),
            other => Err(RiskError::UnknownName {
                kind: "algorithm",
                name: other.to_string(),
            }),
        }
    }
}

/// Names accepted for the main algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainAlgoKind {
    /// Running average of the ancillary iterates.
    Ave,
}

impl MainAlgoKind {
    /// Parses an optional main algorithm name; absent or empty means none.
    pub fn parse_opt(name: Option<&str>) -> Result<Option<Self>> {
        match name {
            None | Some("") => Ok(None),
            Some(name) => name.parse().map(Some),
        }
    }
}

impl FromStr for MainAlgoKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Ave" => Ok(MainAlgoKind::Ave),
            other => Err(RiskError::UnknownName {
                kind: "main algorithm",
                name: other.to_string(),
            }),
        }
    }
}

/// The gradient-descent variants a run can use.
#[derive(Debug)]
pub enum Algo<M> {
    Erm(GradientDescent<M, RiskLoss>),
    Tilted(GradientDescent<M, RiskLoss, Tilted>),
    DroCr(GradientDescent<M, DroCr, CressieRead>),
}

impl<M: Model> Algo<M> {
    pub fn model(&self) -> &M {
        match self {
            Algo::Erm(gd) => gd.model(),
            Algo::Tilted(gd) => gd.model(),
            Algo::DroCr(gd) => gd.model(),
        }
    }

    pub fn into_model(self) -> M {
        match self {
            Algo::Erm(gd) => gd.into_model(),
            Algo::Tilted(gd) => gd.into_model(),
            Algo::DroCr(gd) => gd.into_model(),
        }
    }

    pub fn iteration(&self) -> usize {
        match self {
            Algo::Erm(gd) => gd.iteration(),
            Algo::Tilted(gd) => gd.iteration(),
            Algo::DroCr(gd) => gd.iteration(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Algo::Erm(_) => "SGD",
            Algo::Tilted(_) => "SGD (tilted)",
            Algo::DroCr(_) => "SGD (DRO Cressie-Read)",
        }
    }
}

impl<M: Model> Algorithm for Algo<M> {
    fn update(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        match self {
            Algo::Erm(gd) => gd.update(x, y),
            Algo::Tilted(gd) => gd.update(x, y),
            Algo::DroCr(gd) => gd.update(x, y),
        }
    }
}

/// Builds the ancillary algorithm driving `model` and, if `config.main`
/// names one, the main algorithm averaging it into `model_main`.
///
/// The risk decides the descent flavour: `entropic` tilts the gradients by
/// `gamma`, `dro` rescales them with the Cressie-Read rule and everything else
/// uses plain mean gradients.
///
/// # Errors
/// Returns a configuration fault if an algorithm name is unknown, the step
/// size or tilt is invalid, a `dro` risk comes with a non-DRO loss, or a main
/// algorithm is requested without `model_main`. Every check runs before a
/// model is moved into an algorithm.
pub fn get_algo<M: Model>(
    config: &AlgoConfig,
    risk: &RiskConfig,
    model: M,
    loss: RiskLoss,
    model_main: Option<M>,
) -> Result<(Algo<M>, Option<WeightedAverage<M>>)> {
    let AlgoKind::Sgd = config.name.parse::<AlgoKind>()?;
    let main = MainAlgoKind::parse_opt(config.main.as_deref())?;
    let step_size = config.step_size.build()?;

    if main.is_some() && model_main.is_none() {
        return Err(RiskError::MissingKeyword {
            what: "main algorithm Ave",
            keyword: "model_main",
        });
    }

    if matches!(loss, RiskLoss::DroCr(_)) && !matches!(risk, RiskConfig::Dro { .. }) {
        return Err(RiskError::LossMismatch {
            algorithm: "SGD (erm or entropic)",
            expected: "non-DRO",
        });
    }

    let tilt = match *risk {
        RiskConfig::Entropic { gamma } => Some(Tilted::new(gamma)?),
        _ => None,
    };

    let algo = match (tilt, *risk, loss) {
        (Some(tilt), _, loss) => Algo::Tilted(GradientDescent::new(step_size, model, loss, tilt)),
        (None, RiskConfig::Dro { .. }, RiskLoss::DroCr(loss)) => {
            Algo::DroCr(GradientDescent::dro_cr(step_size, model, loss))
        }
        (None, RiskConfig::Dro { .. }, _) => {
            return Err(RiskError::LossMismatch {
                algorithm: "SGD (dro)",
                expected: "DRO_CR",
            });
        }
        (None, _, loss) => Algo::Erm(GradientDescent::erm(step_size, model, loss)),
    };

    let algo_main = match (main, model_main) {
        (Some(MainAlgoKind::Ave), Some(model_main)) => Some(WeightedAverage::new(model_main)),
        _ => None,
    };

    info!(
        algorithm = algo.label(),
        averaged = algo_main.is_some();
        "selected algorithm"
    );
    Ok((algo, algo_main))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepSizeConfig;
    use ndarray::arr1;
    use risk_core::{AuxParam, LinearModel};

    fn sgd(main: Option<&str>) -> AlgoConfig {
        AlgoConfig {
            name: "SGD".into(),
            main: main.map(String::from),
            step_size: StepSizeConfig::Constant { coef: 0.1 },
        }
    }

    #[test]
    fn get_loss_wraps_the_base_by_risk() {
        let (base, loss) = get_loss("logistic", &RiskConfig::Cvar { prob: 0.9 }).unwrap();
        assert_eq!(base, BaseLoss::Logistic);
        match loss {
            RiskLoss::Cvar(cvar) => assert!((cvar.alpha() - 0.1).abs() < 1e-12),
            other => panic!("unexpected loss {other:?}"),
        }

        let (_, loss) = get_loss("quadratic", &RiskConfig::Entropic { gamma: 1.0 }).unwrap();
        assert_eq!(loss, RiskLoss::Erm(BaseLoss::Quadratic));

        let (_, loss) = get_loss("absolute", &RiskConfig::Dro { atilde: 0.0 }).unwrap();
        assert_eq!(loss.aux_params(), &[AuxParam::Theta]);
    }

    #[test]
    fn unknown_loss_names_are_config_faults() {
        let err = get_loss("hinge", &RiskConfig::Erm).unwrap_err();
        assert_eq!(
            err,
            RiskError::UnknownName {
                kind: "loss",
                name: "hinge".into()
            }
        );
    }

    #[test]
    fn convex_polynomial_needs_an_exponent() {
        assert!(matches!(
            base_loss("convex_polynomial", None),
            Err(RiskError::MissingKeyword { keyword: "exponent", .. })
        ));
        assert!(matches!(
            base_loss("convex_polynomial", Some(0.5)),
            Err(RiskError::InvalidExponent { .. })
        ));
        assert_eq!(base_loss("convex_polynomial", Some(3.0)).unwrap().label(), "convex_polynomial");
    }

    #[test]
    fn unknown_algorithm_leaves_models_untouched() {
        let mut model = LinearModel::from_weights(arr1(&[1.0, 2.0]), 3.0);
        let mut main = model.clone();
        let before = model.clone();
        let (_, loss) = get_loss("quadratic", &RiskConfig::Erm).unwrap();

        let mut config = sgd(Some("Ave"));
        config.name = "unknown".into();
        let err = get_algo(&config, &RiskConfig::Erm, &mut model, loss, Some(&mut main)).unwrap_err();

        assert!(err.is_config_fault());
        assert_eq!(model, before);
        assert_eq!(main, before);
    }

    #[test]
    fn unknown_main_algorithm_is_a_config_fault() {
        let (_, loss) = get_loss("quadratic", &RiskConfig::Erm).unwrap();
        let err = get_algo(&sgd(Some("Median")), &RiskConfig::Erm, LinearModel::new(1), loss, None).unwrap_err();
        assert_eq!(
            err,
            RiskError::UnknownName {
                kind: "main algorithm",
                name: "Median".into()
            }
        );
    }

    #[test]
    fn risk_selects_the_descent_flavour() {
        let risk = RiskConfig::Dro { atilde: 0.2 };
        let (_, loss) = get_loss("quadratic", &risk).unwrap();
        let model = LinearModel::new(1).with_aux(AuxParam::Theta, 0.0);
        let (algo, main) = get_algo(&sgd(Some("Ave")), &risk, model.clone(), loss, Some(model)).unwrap();
        assert!(matches!(algo, Algo::DroCr(_)));
        assert!(main.is_some());

        let risk = RiskConfig::Entropic { gamma: -1.0 };
        let (_, loss) = get_loss("quadratic", &risk).unwrap();
        let (algo, main) = get_algo(&sgd(None), &risk, LinearModel::new(1), loss, None).unwrap();
        assert!(matches!(algo, Algo::Tilted(_)));
        assert!(main.is_none());

        let (_, loss) = get_loss("quadratic", &RiskConfig::Erm).unwrap();
        let (algo, _) = get_algo(&sgd(Some("")), &RiskConfig::Erm, LinearModel::new(1), loss, None).unwrap();
        assert!(matches!(algo, Algo::Erm(_)));
    }

    #[test]
    fn dro_requires_a_dro_loss() {
        let (_, loss) = get_loss("quadratic", &RiskConfig::Erm).unwrap();
        let err = get_algo(&sgd(None), &RiskConfig::Dro { atilde: 0.1 }, LinearModel::new(1), loss, None).unwrap_err();
        assert!(matches!(err, RiskError::LossMismatch { .. }));
    }

    #[test]
    fn dro_loss_requires_the_dro_risk() {
        let (_, loss) = get_loss("quadratic", &RiskConfig::Dro { atilde: 0.1 }).unwrap();
        for risk in [RiskConfig::Erm, RiskConfig::Entropic { gamma: 1.0 }] {
            let model = LinearModel::new(1).with_aux(AuxParam::Theta, 0.0);
            let err = get_algo(&sgd(None), &risk, model, loss.clone(), None).unwrap_err();
            assert!(matches!(err, RiskError::LossMismatch { expected: "non-DRO", .. }));
            assert!(err.is_config_fault());
        }
    }

    #[test]
    fn averaging_requires_a_main_model() {
        let (_, loss) = get_loss("quadratic", &RiskConfig::Erm).unwrap();
        let err = get_algo(&sgd(Some("Ave")), &RiskConfig::Erm, LinearModel::new(1), loss, None).unwrap_err();
        assert!(err.is_config_fault());
    }
}
