use ndarray::{Array2, ArrayView2};

/// A differentiable loss over a batch of predictions.
pub trait LossFn {
    /// The loss of `y_pred` against `y`, a single non-negative scalar for the whole batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;

    /// The derivative of `loss` with respect to each element of `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}
