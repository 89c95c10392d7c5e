use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Mean squared error, averaged over every output of the batch.
#[derive(Default, Clone, Copy, Debug)]
pub struct Mse;

impl Mse {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        if y_pred.is_empty() {
            return 0.;
        }

        let sum = Zip::from(&y_pred)
            .and(&y)
            .fold(0., |acc, p, t| acc + (p - t).powi(2));

        sum / y_pred.len() as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let scale = 2. / y_pred.len().max(1) as f32;
        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|p, t| scale * (p - t))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn averages_squared_errors() {
        let y_pred = array![[1., 0.], [0.5, 0.5]];
        let y = array![[0., 0.], [0.5, 1.5]];

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 0.5);
        assert_eq!(
            Mse.loss_prime(y_pred.view(), y.view()),
            array![[0.5, 0.], [0., -0.5]]
        );
    }
}
