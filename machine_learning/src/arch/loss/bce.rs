use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

const DEFAULT_EPSILON: f32 = 1e-7;

/// Binary cross entropy for predictions in `(0, 1)`.
///
/// Predictions are clamped to `[epsilon, 1 - epsilon]` so the loss stays finite on saturated
/// outputs.
#[derive(Clone, Copy, Debug)]
pub struct BinaryCrossEntropy {
    epsilon: f32,
}

impl BinaryCrossEntropy {
    /// Returns a new `BinaryCrossEntropy` with the given clamping margin.
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    fn clamp(&self, p: f32) -> f32 {
        p.clamp(self.epsilon, 1. - self.epsilon)
    }
}

impl Default for BinaryCrossEntropy {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl LossFn for BinaryCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let mut total = 0.;
        Zip::from(&y_pred).and(&y).for_each(|&p, &y| {
            let p = self.clamp(p);
            total -= y * p.ln() + (1. - y) * (1. - p).ln();
        });

        let n = y_pred.len().max(1) as f32;
        (total / n).max(0.)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;

        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&p, &y| {
                let p = self.clamp(p);
                (p - y) / (p * (1. - p) * n)
            })
    }
}
