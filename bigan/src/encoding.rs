use ndarray::{Array2, Axis};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// How random encodings are drawn and how the encoder's output is made comparable to them.
pub trait RandomEncodingStrategy {
    /// Draws a `batch_size × width` batch of random encodings.
    fn sample(&self, batch_size: usize, width: usize, rng: &mut dyn RngCore) -> Array2<f32>;

    /// Maps predicted encodings into the space `sample` draws from.
    fn canonicalize(&self, predicted: Array2<f32>) -> Array2<f32>;
}

/// Encodings are classes: one-hot rows with a uniformly chosen hot index.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneHot;

impl RandomEncodingStrategy for OneHot {
    fn sample(&self, batch_size: usize, width: usize, rng: &mut dyn RngCore) -> Array2<f32> {
        let mut encodings = Array2::zeros((batch_size, width));
        if width == 0 {
            return encodings;
        }

        for mut row in encodings.rows_mut() {
            row[rng.random_range(0..width)] = 1.;
        }

        encodings
    }

    /// Sets each row's maximum to 1 and everything else to 0, ties go to the first maximum.
    /// NaN never wins, a row of NaN comes out all zeros.
    fn canonicalize(&self, mut predicted: Array2<f32>) -> Array2<f32> {
        for mut row in predicted.axis_iter_mut(Axis(0)) {
            let hot = row
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_nan())
                .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
                    Some((_, max)) if max >= v => best,
                    _ => Some((i, v)),
                })
                .map(|(i, _)| i);

            row.fill(0.);
            if let Some(hot) = hot {
                row[hot] = 1.;
            }
        }

        predicted
    }
}

/// Encodings are points of the unit hypercube, each coordinate uniform in `[0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl RandomEncodingStrategy for Uniform {
    fn sample(&self, batch_size: usize, width: usize, rng: &mut dyn RngCore) -> Array2<f32> {
        Array2::from_shape_simple_fn((batch_size, width), || rng.random::<f32>())
    }

    fn canonicalize(&self, predicted: Array2<f32>) -> Array2<f32> {
        predicted
    }
}

/// The encoding regime of a run, picks the strategy from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Categorical,
    #[default]
    Continuous,
}

impl RandomEncodingStrategy for Regime {
    fn sample(&self, batch_size: usize, width: usize, rng: &mut dyn RngCore) -> Array2<f32> {
        match self {
            Regime::Categorical => OneHot.sample(batch_size, width, rng),
            Regime::Continuous => Uniform.sample(batch_size, width, rng),
        }
    }

    fn canonicalize(&self, predicted: Array2<f32>) -> Array2<f32> {
        match self {
            Regime::Categorical => OneHot.canonicalize(predicted),
            Regime::Continuous => Uniform.canonicalize(predicted),
        }
    }
}
