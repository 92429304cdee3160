use std::fmt;

/// The result type used across the risk crates.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Faults raised by losses, models and algorithms.
///
/// Variants fall in two families: configuration faults, raised when something is
/// constructed or selected with invalid settings, and shape faults, raised while
/// computing values or gradients on tensors whose ranks or lengths disagree.
/// None of them are transient; callers should treat them as fatal for the run.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskError {
    /// The convex polynomial loss requires `exponent >= 1`.
    InvalidExponent { exponent: f64 },

    /// The Cressie-Read shape parameter must be strictly greater than one.
    InvalidShape { shape: f64 },

    /// A scalar hyperparameter is out of its valid domain.
    InvalidHyper {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A factory lookup received a name it does not know.
    UnknownName { kind: &'static str, name: String },

    /// A named selection needs a keyword that was not provided.
    MissingKeyword {
        what: &'static str,
        keyword: &'static str,
    },

    /// A risk needs an auxiliary parameter the model does not carry.
    MissingAuxParam { param: &'static str },

    /// The loss has no gradient (e.g. the zero-one loss).
    NotDifferentiable { loss: &'static str },

    /// An algorithm was paired with a loss it cannot drive.
    LossMismatch {
        algorithm: &'static str,
        expected: &'static str,
    },

    /// A configuration document could not be read or parsed.
    Config(String),

    /// A tensor has more axes than the tensor it must broadcast into.
    RankMismatch {
        what: &'static str,
        got: usize,
        max: usize,
    },

    /// A length invariant was violated (e.g. sample counts disagree).
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },

    /// The model output is not a single column.
    NotSingleOutput { shape: Vec<usize> },

    /// A primary parameter expected by an operation is absent.
    MissingParam { name: String },

    /// An operation needs at least one sample.
    EmptyBatch { what: &'static str },
}

impl RiskError {
    /// Returns true for faults raised at construction or selection time.
    pub fn is_config_fault(&self) -> bool {
        matches!(
            self,
            RiskError::InvalidExponent { .. }
                | RiskError::InvalidShape { .. }
                | RiskError::InvalidHyper { .. }
                | RiskError::UnknownName { .. }
                | RiskError::MissingKeyword { .. }
                | RiskError::MissingAuxParam { .. }
                | RiskError::NotDifferentiable { .. }
                | RiskError::LossMismatch { .. }
                | RiskError::Config(_)
        )
    }

    /// Returns true for faults raised while transforming tensors.
    pub fn is_shape_fault(&self) -> bool {
        !self.is_config_fault()
    }
}

impl fmt::Display for RiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskError::InvalidExponent { exponent } => {
                write!(f, "invalid exponent {exponent}: only exponent >= 1.0 is convex")
            }
            RiskError::InvalidShape { shape } => {
                write!(f, "invalid Cressie-Read shape {shape}: must be > 1.0")
            }
            RiskError::InvalidHyper {
                name,
                value,
                reason,
            } => write!(f, "invalid {name} = {value}: {reason}"),
            RiskError::UnknownName { kind, name } => write!(f, "unknown {kind} name '{name}'"),
            RiskError::MissingKeyword { what, keyword } => {
                write!(f, "{what} requires the '{keyword}' keyword")
            }
            RiskError::MissingAuxParam { param } => {
                write!(f, "model is missing the auxiliary parameter '{param}'")
            }
            RiskError::NotDifferentiable { loss } => write!(f, "loss '{loss}' has no gradient"),
            RiskError::LossMismatch {
                algorithm,
                expected,
            } => write!(f, "algorithm '{algorithm}' requires a {expected} loss"),
            RiskError::Config(msg) => write!(f, "invalid config: {msg}"),
            RiskError::RankMismatch { what, got, max } => {
                write!(f, "rank mismatch for {what}: got {got} axes, at most {max} allowed")
            }
            RiskError::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got:?}, expected {expected:?}"),
            RiskError::NotSingleOutput { shape } => {
                write!(f, "require model(X) - y to have shape (n, 1), got {shape:?}")
            }
            RiskError::MissingParam { name } => write!(f, "missing parameter '{name}'"),
            RiskError::EmptyBatch { what } => write!(f, "{what} needs at least one sample"),
        }
    }
}

impl std::error::Error for RiskError {}
