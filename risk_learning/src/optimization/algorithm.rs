use ndarray::ArrayView2;
use risk_core::Result;

/// A first-order training algorithm that owns the model it updates.
pub trait Algorithm {
    /// Performs one update of the owned model using the batch `(x, y)`.
    ///
    /// # Errors
    /// Returns `RiskError` if the direction cannot be computed; the model is
    /// left untouched in that case.
    fn update(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()>;
}

impl<T: Algorithm + ?Sized> Algorithm for Box<T> {
    fn update(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        (**self).update(x, y)
    }
}
