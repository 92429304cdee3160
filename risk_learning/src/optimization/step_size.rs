use std::fmt;

use risk_core::{Result, RiskError};

/// Step-size coefficient applied to each descent direction.
///
/// `t` counts the updates already performed, starting at zero.
pub enum StepSize {
    /// `η`.
    Constant(f64),
    /// `η / sqrt(t + 1)`.
    InverseSqrt(f64),
    /// `η / (t + 1)`.
    InverseTime(f64),
    /// Any caller-provided schedule.
    Custom(Box<dyn Fn(usize) -> f64>),
}

impl StepSize {
    /// Returns a constant step size.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidHyper` unless `eta` is finite and positive.
    pub fn constant(eta: f64) -> Result<Self> {
        check_coef(eta).map(|_| StepSize::Constant(eta))
    }

    pub fn inverse_sqrt(eta: f64) -> Result<Self> {
        check_coef(eta).map(|_| StepSize::InverseSqrt(eta))
    }

    pub fn inverse_time(eta: f64) -> Result<Self> {
        check_coef(eta).map(|_| StepSize::InverseTime(eta))
    }

    pub fn custom(schedule: impl Fn(usize) -> f64 + 'static) -> Self {
        StepSize::Custom(Box::new(schedule))
    }

    /// The step coefficient for update number `t`.
    pub fn at(&self, t: usize) -> f64 {
        let t1 = (t + 1) as f64;
        match self {
            StepSize::Constant(eta) => *eta,
            StepSize::InverseSqrt(eta) => eta / t1.sqrt(),
            StepSize::InverseTime(eta) => eta / t1,
            StepSize::Custom(f) => f(t),
        }
    }
}

fn check_coef(eta: f64) -> Result<()> {
    if eta > 0.0 && eta.is_finite() {
        Ok(())
    } else {
        Err(RiskError::InvalidHyper {
            name: "step_size",
            value: eta,
            reason: "must be finite and positive",
        })
    }
}

impl fmt::Debug for StepSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSize::Constant(eta) => write!(f, "Constant({eta})"),
            StepSize::InverseSqrt(eta) => write!(f, "InverseSqrt({eta})"),
            StepSize::InverseTime(eta) => write!(f, "InverseTime({eta})"),
            StepSize::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedules_decay_as_advertised() {
        let c = StepSize::constant(0.1).unwrap();
        assert_eq!(c.at(0), 0.1);
        assert_eq!(c.at(99), 0.1);

        let s = StepSize::inverse_sqrt(1.0).unwrap();
        assert_eq!(s.at(0), 1.0);
        assert_eq!(s.at(3), 0.5);

        let t = StepSize::inverse_time(2.0).unwrap();
        assert_eq!(t.at(0), 2.0);
        assert_eq!(t.at(3), 0.5);

        let custom = StepSize::custom(|t| if t < 2 { 1.0 } else { 0.1 });
        assert_eq!(custom.at(1), 1.0);
        assert_eq!(custom.at(2), 0.1);
    }

    #[test]
    fn non_positive_coefficients_are_rejected() {
        for eta in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = StepSize::constant(eta).unwrap_err();
            assert!(err.is_config_fault());
        }
    }
}
