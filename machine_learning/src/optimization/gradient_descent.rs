use super::{Optimizer, check_lengths};
use crate::Result;

/// Gradient descent optimization algorithm.
#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Updates the parameters according to the algorithm's learning rule, that is, making a step in
    /// the opposite direction of the gradient, with a length of `learning_rate`.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient used for taking the step.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_lengths(params, grad)?;
        let lr = self.learning_rate;

        for (w, g) in params.iter_mut().zip(grad) {
            *w -= lr * g;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MlErr;

    #[test]
    fn steps_against_the_gradient() {
        let mut params = [1., -1.];
        GradientDescent::new(0.5)
            .update_params(&mut params, &[2., -4.])
            .unwrap();

        assert_eq!(params, [0., 1.]);
    }

    #[test]
    fn gradient_of_another_size_is_refused() {
        let mut params = [1., -1.];
        let err = GradientDescent::new(0.5).update_params(&mut params, &[2.]);

        assert!(matches!(err, Err(MlErr::SizeMismatch { got: 1, expected: 2, .. })));
        assert_eq!(params, [1., -1.]);
    }
}
