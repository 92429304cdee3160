//! Serializable descriptions of a training run.

use std::path::Path;

use risk_core::{Result, RiskError};
use serde::{Deserialize, Serialize};

use crate::optimization::StepSize;

/// The risk functional to optimize, tagged by `risk_name`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "risk_name")]
pub enum RiskConfig {
    #[serde(rename = "erm")]
    Erm,
    /// Tilted (entropic) risk; the tilt lives in the algorithm.
    #[serde(rename = "entropic")]
    Entropic { gamma: f64 },
    #[serde(rename = "mvHuber")]
    MvHuber { alpha: f64, beta: f64, lam: f64 },
    #[serde(rename = "cvar")]
    Cvar { prob: f64 },
    #[serde(rename = "dro")]
    Dro { atilde: f64 },
}

impl RiskConfig {
    pub fn name(&self) -> &'static str {
        match self {
            RiskConfig::Erm => "erm",
            RiskConfig::Entropic { .. } => "entropic",
            RiskConfig::MvHuber { .. } => "mvHuber",
            RiskConfig::Cvar { .. } => "cvar",
            RiskConfig::Dro { .. } => "dro",
        }
    }
}

/// Serialized form of a [`StepSize`] schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSizeConfig {
    Constant { coef: f64 },
    InverseSqrt { coef: f64 },
    InverseTime { coef: f64 },
}

impl StepSizeConfig {
    /// Builds the schedule.
    ///
    /// # Errors
    /// Returns `RiskError::InvalidHyper` unless `coef` is finite and positive.
    pub fn build(&self) -> Result<StepSize> {
        match *self {
            StepSizeConfig::Constant { coef } => StepSize::constant(coef),
            StepSizeConfig::InverseSqrt { coef } => StepSize::inverse_sqrt(coef),
            StepSizeConfig::InverseTime { coef } => StepSize::inverse_time(coef),
        }
    }
}

/// The ancillary algorithm name and the optional main (averaging) algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoConfig {
    pub name: String,
    #[serde(default)]
    pub main: Option<String>,
    pub step_size: StepSizeConfig,
}

/// A complete training run: loss, risk, algorithm and synthetic data shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub loss: String,
    /// Only read for the `convex_polynomial` loss.
    #[serde(default)]
    pub exponent: Option<f64>,
    pub risk: RiskConfig,
    pub algo: AlgoConfig,
    pub n_features: usize,
    pub n_samples: usize,
    pub batch_size: usize,
    pub epochs: usize,
    #[serde(default)]
    pub noise: f64,
    pub seed: Option<u64>,
}

impl ExperimentConfig {
    /// Parses an `ExperimentConfig` from JSON text.
    ///
    /// # Errors
    /// Returns `RiskError::Config` if the text is not a valid configuration.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| RiskError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads an `ExperimentConfig` from a JSON file.
    ///
    /// # Errors
    /// Returns `RiskError::Config` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RiskError::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            return Err(RiskError::Config("n_features must not be zero".into()));
        }
        if self.batch_size == 0 || self.batch_size > self.n_samples {
            return Err(RiskError::Config(format!(
                "batch_size must lie in 1..={}, got {}",
                self.n_samples, self.batch_size
            )));
        }
        Ok(())
    }
}
