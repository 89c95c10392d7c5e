use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{layers::Dense, loss::LossFn};
use crate::{MlErr, Result, initialization::RandWeightGen, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns a flat buffer with the parameters of every layer, in layer order, and an
/// equally sized buffer for the gradient of the last backward pass.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl Sequential {
    /// Creates a new `Sequential` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if two consecutive layers don't fit together.
    pub fn new<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Dense>,
    {
        let layers: Vec<Dense> = layers.into_iter().collect();

        for pair in layers.windows(2) {
            let (out, inp) = (pair[0].dim().1, pair[1].dim().0);
            if out != inp {
                return Err(MlErr::SizeMismatch {
                    what: "consecutive layers",
                    got: inp,
                    expected: out,
                });
            }
        }

        let size = layers.iter().map(Dense::size).sum();

        Ok(Self {
            layers,
            params: vec![0.; size],
            grad: vec![0.; size],
        })
    }

    /// Initializes the weights of each layer with Xavier uniform and its biases with zero.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw the weights from.
    pub fn init_xavier<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let mut offset = 0;

        for layer in &self.layers {
            let (fan_in, fan_out) = layer.dim();
            let w_size = fan_in * fan_out;
            let weights = RandWeightGen::xavier_uniform(fan_in, fan_out)?.sample(rng, w_size);

            self.params[offset..offset + w_size].copy_from_slice(&weights);
            self.params[offset + w_size..offset + layer.size()].fill(0.);
            offset += layer.size();
        }

        Ok(())
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    /// Returns the width of the input this model expects.
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.dim().0)
    }

    /// Returns the width of the output this model produces.
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.dim().1)
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Computes the output of the model without touching any of its state.
    ///
    /// # Arguments
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The model's prediction for every row of `x`.
    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut out = x.to_owned();
        let mut offset = 0;

        for layer in &self.layers {
            let params = &self.params[offset..offset + layer.size()];
            out = layer.predict(params, out.view())?;
            offset += layer.size();
        }

        Ok(out)
    }

    /// Makes a forward pass through the network, recording what `backward` needs.
    ///
    /// # Arguments
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let Self { layers, params, .. } = self;
        let mut out = x.to_owned();
        let mut offset = 0;

        for layer in layers.iter_mut() {
            let size = layer.size();
            out = layer.forward(&params[offset..offset + size], out.view())?.to_owned();
            offset += size;
        }

        Ok(out)
    }

    /// Back propagates the derivative of the loss with respect to the output of the last
    /// `forward`, overwriting the model's gradient. The parameters are left untouched.
    ///
    /// # Arguments
    /// * `d` - The derivative of the loss with respect to the model's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the model's input.
    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        let Self {
            layers,
            params,
            grad,
        } = self;
        let mut end = params.len();

        for layer in layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }

    /// Applies the gradient of the last `backward` to the parameters.
    ///
    /// # Arguments
    /// * `optimizer` - The update rule.
    pub fn step(&mut self, optimizer: &mut dyn Optimizer) -> Result<()> {
        optimizer.update_params(&mut self.params, &self.grad)
    }

    /// Makes a single gradient step over a batch.
    ///
    /// # Arguments
    /// * `x` - The input batch.
    /// * `y` - The expected output for every row of `x`.
    /// * `loss_fn` - The loss to minimize.
    /// * `optimizer` - The update rule.
    ///
    /// # Returns
    /// The loss of the batch measured before the update.
    pub fn train_on_batch(
        &mut self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &dyn LossFn,
        optimizer: &mut dyn Optimizer,
    ) -> Result<f32> {
        let y_pred = self.forward(x)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "targets",
                got: y.len(),
                expected: y_pred.len(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        self.backward(loss_fn.loss_prime(y_pred.view(), y))?;
        self.step(optimizer)?;

        Ok(loss)
    }
}
