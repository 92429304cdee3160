//! Training algorithms and the direction rules they are built from.

mod algorithm;
mod cressie_read;
mod direction;
mod gradient_descent;
mod step_size;
mod weighted_average;

pub use algorithm::Algorithm;
pub use cressie_read::CressieRead;
pub use direction::{DirectionRule, MeanGradient, Tilted};
pub use gradient_descent::GradientDescent;
pub use step_size::StepSize;
pub use weighted_average::WeightedAverage;
