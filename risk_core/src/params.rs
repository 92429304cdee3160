use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use ndarray::{Array1, ArrayD};

use crate::error::{Result, RiskError};

/// Scalar parameters introduced by a risk functional rather than by the model itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuxParam {
    /// Mean-variance location `μ`.
    Location,
    /// Mean-variance scale `σ`.
    Scale,
    /// CVaR value-at-risk variable `v`.
    Threshold,
    /// Cressie-Read dual variable `θ`.
    Theta,
}

impl AuxParam {
    pub const ALL: [AuxParam; 4] = [
        AuxParam::Location,
        AuxParam::Scale,
        AuxParam::Threshold,
        AuxParam::Theta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AuxParam::Location => "location",
            AuxParam::Scale => "scale",
            AuxParam::Threshold => "threshold",
            AuxParam::Theta => "theta",
        }
    }
}

impl fmt::Display for AuxParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of a single entry in a parameter-shaped map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKey {
    Primary(String),
    Aux(AuxParam),
}

/// The parameters owned by a model.
///
/// Primary parameters are tensors addressed by name and iterated in a stable
/// (sorted) order. Auxiliary parameters are scalars with a dedicated slot each,
/// present only when the risk being optimized needs them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    primary: BTreeMap<String, ArrayD<f64>>,
    location: Option<f64>,
    scale: Option<f64>,
    threshold: Option<f64>,
    theta: Option<f64>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a primary parameter, builder style.
    pub fn with_primary(mut self, name: impl Into<String>, value: ArrayD<f64>) -> Self {
        self.insert_primary(name, value);
        self
    }

    /// Adds (or replaces) an auxiliary parameter, builder style.
    pub fn with_aux(mut self, param: AuxParam, value: f64) -> Self {
        self.set_aux(param, value);
        self
    }

    pub fn insert_primary(&mut self, name: impl Into<String>, value: ArrayD<f64>) {
        self.primary.insert(name.into(), value);
    }

    pub fn primary(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.primary.get(name)
    }

    pub fn primary_mut(&mut self, name: &str) -> Option<&mut ArrayD<f64>> {
        self.primary.get_mut(name)
    }

    /// Iterates over the primary parameters in name order.
    pub fn primaries(&self) -> impl Iterator<Item = (&str, &ArrayD<f64>)> {
        self.primary.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn primaries_mut(&mut self) -> impl Iterator<Item = (&str, &mut ArrayD<f64>)> {
        self.primary.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads an auxiliary parameter the caller requires.
    ///
    /// # Errors
    /// Returns `RiskError::MissingAuxParam` if the model does not carry it.
    pub fn aux(&self, param: AuxParam) -> Result<f64> {
        self.aux_opt(param).ok_or(RiskError::MissingAuxParam {
            param: param.name(),
        })
    }

    pub fn aux_opt(&self, param: AuxParam) -> Option<f64> {
        *self.slot(param)
    }

    pub fn set_aux(&mut self, param: AuxParam, value: f64) {
        *self.slot_mut(param) = Some(value);
    }

    /// Iterates over the auxiliary parameters that are present.
    pub fn auxes(&self) -> impl Iterator<Item = (AuxParam, f64)> + '_ {
        AuxParam::ALL
            .into_iter()
            .filter_map(|p| self.aux_opt(p).map(|v| (p, v)))
    }

    /// Returns the addresses of every parameter this record holds.
    pub fn keys(&self) -> BTreeSet<ParamKey> {
        self.primary
            .keys()
            .cloned()
            .map(ParamKey::Primary)
            .chain(self.auxes().map(|(p, _)| ParamKey::Aux(p)))
            .collect()
    }

    /// Adds `step * direction` to every parameter named in `directions`.
    ///
    /// Every entry is validated before anything is written, so a failing call
    /// leaves the parameters untouched.
    ///
    /// # Errors
    /// Returns `RiskError::MissingParam`, `RiskError::MissingAuxParam` or
    /// `RiskError::ShapeMismatch` when `directions` does not fit this record.
    pub fn apply(&mut self, directions: &Directions, step: f64) -> Result<()> {
        for (name, dir) in &directions.primary {
            let p = self
                .primary
                .get(name)
                .ok_or_else(|| RiskError::MissingParam { name: name.clone() })?;

            if p.shape() != dir.shape() {
                return Err(RiskError::ShapeMismatch {
                    what: "descent direction",
                    got: dir.shape().to_vec(),
                    expected: p.shape().to_vec(),
                });
            }
        }
        for &param in directions.aux.keys() {
            self.aux(param)?;
        }

        for (name, dir) in &directions.primary {
            if let Some(p) = self.primary.get_mut(name) {
                p.scaled_add(step, dir);
            }
        }
        for (&param, &dir) in &directions.aux {
            if let Some(v) = self.slot_mut(param).as_mut() {
                *v += step * dir;
            }
        }

        Ok(())
    }

    fn slot(&self, param: AuxParam) -> &Option<f64> {
        match param {
            AuxParam::Location => &self.location,
            AuxParam::Scale => &self.scale,
            AuxParam::Threshold => &self.threshold,
            AuxParam::Theta => &self.theta,
        }
    }

    fn slot_mut(&mut self, param: AuxParam) -> &mut Option<f64> {
        match param {
            AuxParam::Location => &mut self.location,
            AuxParam::Scale => &mut self.scale,
            AuxParam::Threshold => &mut self.threshold,
            AuxParam::Theta => &mut self.theta,
        }
    }
}

/// A parameter-shaped map: one entry per primary name and per auxiliary slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMap<P, A> {
    pub primary: BTreeMap<String, P>,
    pub aux: BTreeMap<AuxParam, A>,
}

impl<P, A> Default for ParamMap<P, A> {
    fn default() -> Self {
        Self {
            primary: BTreeMap::new(),
            aux: BTreeMap::new(),
        }
    }
}

impl<P, A> ParamMap<P, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> BTreeSet<ParamKey> {
        self.primary
            .keys()
            .cloned()
            .map(ParamKey::Primary)
            .chain(self.aux.keys().copied().map(ParamKey::Aux))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.aux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-sample gradients: primary entries have shape `(n, *param_shape)` and
/// auxiliary entries have shape `(n,)`.
pub type Grads = ParamMap<ArrayD<f64>, Array1<f64>>;

/// Reduced step directions, shaped like the parameters they move.
pub type Directions = ParamMap<ArrayD<f64>, f64>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, ArrayD, IxDyn};

    fn params() -> Params {
        Params::new()
            .with_primary("w", ArrayD::zeros(IxDyn(&[2, 1])))
            .with_aux(AuxParam::Location, 1.0)
    }

    #[test]
    fn missing_aux_is_a_config_fault() {
        let err = params().aux(AuxParam::Theta).unwrap_err();
        assert_eq!(err, RiskError::MissingAuxParam { param: "theta" });
        assert!(err.is_config_fault());
    }

    #[test]
    fn keys_cover_primary_and_present_aux() {
        let keys = params().keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&ParamKey::Primary("w".into())));
        assert!(keys.contains(&ParamKey::Aux(AuxParam::Location)));
    }

    #[test]
    fn apply_moves_every_entry() {
        let mut p = params();
        let mut dirs = Directions::new();
        dirs.primary.insert("w".into(), arr2(&[[1.0], [-2.0]]).into_dyn());
        dirs.aux.insert(AuxParam::Location, 4.0);

        p.apply(&dirs, 0.5).unwrap();

        let w = p.primary("w").unwrap();
        assert_eq!(w[[0, 0]], 0.5);
        assert_eq!(w[[1, 0]], -1.0);
        assert_eq!(p.aux(AuxParam::Location).unwrap(), 3.0);
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let mut p = params();
        let before = p.clone();
        let mut dirs = Directions::new();
        dirs.primary.insert("w".into(), ArrayD::ones(IxDyn(&[2, 1])));
        dirs.aux.insert(AuxParam::Scale, 1.0);

        assert!(p.apply(&dirs, 1.0).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn apply_rejects_wrong_shape() {
        let mut p = params();
        let mut dirs = Directions::new();
        dirs.primary.insert("w".into(), ArrayD::ones(IxDyn(&[3])));

        let err = p.apply(&dirs, 1.0).unwrap_err();
        assert!(matches!(err, RiskError::ShapeMismatch { .. }));
    }
}
