use ndarray::{Array, ArrayBase, Data, Dimension};

/// A smooth convex surrogate for `|x|`, with its first two derivatives.
///
/// Implementors only define the scalar maps; the array versions apply them
/// elementwise to tensors of any shape.
pub trait Dispersion {
    fn value(&self, x: f64) -> f64;
    fn d1(&self, x: f64) -> f64;
    fn d2(&self, x: f64) -> f64;

    fn value_array<S, D>(&self, x: &ArrayBase<S, D>) -> Array<f64, D>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        x.mapv(|v| self.value(v))
    }

    fn d1_array<S, D>(&self, x: &ArrayBase<S, D>) -> Array<f64, D>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        x.mapv(|v| self.d1(v))
    }

    fn d2_array<S, D>(&self, x: &ArrayBase<S, D>) -> Array<f64, D>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        x.mapv(|v| self.d2(v))
    }
}

/// The pseudo-Huber function `sqrt(x² + 1) − 1`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PseudoHuber;

impl Dispersion for PseudoHuber {
    #[inline]
    fn value(&self, x: f64) -> f64 {
        (x * x + 1.0).sqrt() - 1.0
    }

    #[inline]
    fn d1(&self, x: f64) -> f64 {
        x / (x * x + 1.0).sqrt()
    }

    #[inline]
    fn d2(&self, x: f64) -> f64 {
        (x * x + 1.0).powf(-1.5)
    }
}
