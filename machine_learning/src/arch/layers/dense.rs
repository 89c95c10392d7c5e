use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · w + b)`.
///
/// The layer doesn't own its parameters, it reads them from a slice of `(dim.0 + 1) * dim.1`
/// elements laid out as the row-major weights followed by the biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - The activation to apply to the linear output, if any.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of inputs and outputs of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Computes the output of the layer without recording anything for a later backward pass.
    ///
    /// # Arguments
    /// * `params` - The parameters of this layer.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The layer's output or an error if the shapes don't match.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut z = self.linear(params, x)?;

        if let Some(act_fn) = &self.act_fn {
            z.mapv_inplace(|z| act_fn.f(z));
        }

        Ok(z)
    }

    /// Computes the output of the layer, keeping the input and the pre activation for
    /// `backward`.
    ///
    /// # Arguments
    /// * `params` - The parameters of this layer.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// A view of the layer's output or an error if the shapes don't match.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        self.z = self.linear(params, x)?;
        self.x = x.to_owned();

        let Some(act_fn) = &self.act_fn else {
            return Ok(self.z.view());
        };

        self.a = self.z.mapv(|z| act_fn.f(z));
        Ok(self.a.view())
    }

    /// Writes the gradient of this layer into `grad` given the delta of its output.
    ///
    /// # Arguments
    /// * `params` - The parameters of this layer.
    /// * `grad` - The buffer for this layer's gradient.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense output delta",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn linear(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input columns",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;
        Ok(z)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len(grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.mismatch(w_size))?;
        let db = ArrayViewMut1::from(db_raw);
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len(params.len())?;

        let w_size = self.size - self.dim.1;
        let (w_raw, b_raw) = params.split_at(w_size);
        let weights = ArrayView2::from_shape(self.dim, w_raw).map_err(|_| self.mismatch(w_size))?;
        let biases = ArrayView1::from(b_raw);
        Ok((weights, biases))
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.size {
            return Err(self.mismatch(len));
        }

        Ok(())
    }

    fn mismatch(&self, got: usize) -> MlErr {
        MlErr::SizeMismatch {
            what: "dense parameters",
            got,
            expected: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn forward_applies_weights_then_bias() {
        // w = [[1, 2], [3, 4]], b = [0.5, -1]
        let params = [1., 2., 3., 4., 0.5, -1.];
        let mut layer = Dense::new((2, 2), None);

        let x = array![[1., 1.], [0., 2.]];
        let y = layer.forward(&params, x.view()).unwrap().to_owned();

        assert_eq!(y, array![[4.5, 5.], [6.5, 7.]]);
        assert_eq!(layer.predict(&params, x.view()).unwrap(), y);
    }

    #[test]
    fn backward_computes_gradient_and_input_delta() {
        let params = [1., 2., 3., 4., 0., 0.];
        let mut grad = [0.; 6];
        let mut layer = Dense::new((2, 2), None);

        let x = array![[1., 2.]];
        layer.forward(&params, x.view()).unwrap();
        let dx = layer
            .backward(&params, &mut grad, array![[1., 1.]])
            .unwrap();

        assert_eq!(grad, [1., 1., 2., 2., 1., 1.]);
        assert_eq!(dx, array![[3., 7.]]);
    }

    #[test]
    fn wrong_input_width_is_an_error() {
        let layer = Dense::new((3, 1), None);
        let params = [0.; 4];

        let err = layer.predict(&params, array![[1., 2.]].view());
        assert!(matches!(err, Err(MlErr::SizeMismatch { got: 2, expected: 3, .. })));
    }
}
