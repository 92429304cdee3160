//! Composite losses that turn a base loss into an estimator of a risk functional.

mod cvar;
mod dro_cr;
mod mv_huber;

pub use cvar::Cvar;
pub use dro_cr::{DroCr, parse_dro};
pub use mv_huber::MvHuber;

pub(crate) use dro_cr::check_cressie_read;

use ndarray::{Array1, ArrayView2};
use risk_core::{AuxParam, BaseLoss, Grads, Loss, Model, Result};

/// The closed set of risk functionals a training run can optimize.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskLoss {
    /// Empirical risk: the base loss itself.
    Erm(BaseLoss),
    MvHuber(MvHuber),
    Cvar(Cvar),
    DroCr(DroCr),
}

impl RiskLoss {
    /// The wrapped pointwise loss.
    pub fn base(&self) -> &BaseLoss {
        match self {
            RiskLoss::Erm(base) => base,
            RiskLoss::MvHuber(loss) => loss.base(),
            RiskLoss::Cvar(loss) => loss.base(),
            RiskLoss::DroCr(loss) => loss.base(),
        }
    }

    /// Auxiliary parameters the model must carry for this risk.
    pub fn aux_params(&self) -> &'static [AuxParam] {
        match self {
            RiskLoss::Erm(_) => &[],
            RiskLoss::MvHuber(_) => &[AuxParam::Location, AuxParam::Scale],
            RiskLoss::Cvar(_) => &[AuxParam::Threshold],
            RiskLoss::DroCr(_) => &[AuxParam::Theta],
        }
    }
}

impl Loss for RiskLoss {
    fn name(&self) -> String {
        match self {
            RiskLoss::Erm(loss) => loss.name(),
            RiskLoss::MvHuber(loss) => loss.name(),
            RiskLoss::Cvar(loss) => loss.name(),
            RiskLoss::DroCr(loss) => loss.name(),
        }
    }

    fn value(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        match self {
            RiskLoss::Erm(loss) => loss.value(model, x, y),
            RiskLoss::MvHuber(loss) => loss.value(model, x, y),
            RiskLoss::Cvar(loss) => loss.value(model, x, y),
            RiskLoss::DroCr(loss) => loss.value(model, x, y),
        }
    }

    fn gradient(&self, model: &dyn Model, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Grads> {
        match self {
            RiskLoss::Erm(loss) => loss.gradient(model, x, y),
            RiskLoss::MvHuber(loss) => loss.gradient(model, x, y),
            RiskLoss::Cvar(loss) => loss.gradient(model, x, y),
            RiskLoss::DroCr(loss) => loss.gradient(model, x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_params_follow_the_risk() {
        let erm = RiskLoss::Erm(BaseLoss::Quadratic);
        assert!(erm.aux_params().is_empty());
        let dro = RiskLoss::DroCr(DroCr::new(BaseLoss::Quadratic, 0.0, 2.0).unwrap());
        assert_eq!(dro.aux_params(), &[AuxParam::Theta]);
        assert_eq!(dro.base(), &BaseLoss::Quadratic);
        assert_eq!(dro.name(), "DRO_CR x quadratic");
    }
}
