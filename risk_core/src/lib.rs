//! Building blocks for risk-sensitive learning: the error taxonomy, the
//! parameter record, the `Model` and `Loss` abstractions, dispersion functions
//! and the elementary pointwise losses that risk functionals wrap.

pub mod dispersion;
pub mod error;
pub mod loss;
pub mod model;
pub mod params;
pub mod tensor;

pub use dispersion::{Dispersion, PseudoHuber};
pub use error::{Result, RiskError};
pub use loss::{BaseLoss, ConvexPolynomial, Loss};
pub use model::{LinearModel, Model};
pub use params::{AuxParam, Directions, Grads, ParamKey, ParamMap, Params};
