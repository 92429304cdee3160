pub mod config;
pub mod factory;
pub mod optimization;
pub mod risk;
pub mod threshold;

pub use config::{AlgoConfig, ExperimentConfig, RiskConfig, StepSizeConfig};
pub use factory::{Algo, AlgoKind, MainAlgoKind, base_loss, get_algo, get_loss, wrap_loss};
pub use optimization::{
    Algorithm, CressieRead, DirectionRule, GradientDescent, MeanGradient, StepSize, Tilted,
    WeightedAverage,
};
pub use risk::{Cvar, DroCr, MvHuber, RiskLoss, parse_dro};
pub use threshold::ThresholdSetter;
