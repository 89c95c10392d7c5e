use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::Result;

/// A weight generator that follows a certain probabilistic distribution.
#[derive(Clone, Debug)]
pub struct RandWeightGen<D: Distribution<f32>> {
    distribution: D,
}

impl<D: Distribution<f32>> RandWeightGen<D> {
    /// Creates a new `RandWeightGen` weight generator.
    ///
    /// # Arguments
    /// * `distribution` - The distribution to sample the random numbers from.
    pub fn new(distribution: D) -> Self {
        Self { distribution }
    }

    /// Draws `n` weights.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw from.
    /// * `n` - The amount of weights.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f32> {
        (0..n).map(|_| self.distribution.sample(rng)).collect()
    }
}

impl RandWeightGen<Uniform<f32>> {
    /// Creates a new `RandWeightGen` weight generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(Uniform::new(low, high)?))
    }

    /// Creates a new `RandWeightGen` weight generator using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn xavier_uniform(fan_in: usize, fan_out: usize) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(-range, range)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn xavier_uniform_stays_within_its_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let weight_gen = RandWeightGen::xavier_uniform(4, 2).unwrap();
        let range = 1.;

        let weights = weight_gen.sample(&mut rng, 100);

        assert_eq!(weights.len(), 100);
        assert!(weights.iter().all(|w| (-range..range).contains(w)));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(RandWeightGen::uniform(1., 1.).is_err());
        assert!(RandWeightGen::uniform(f32::NAN, 1.).is_err());
    }

    #[test]
    fn same_seed_same_weights() {
        let weight_gen = RandWeightGen::xavier_uniform(8, 4).unwrap();

        let a = weight_gen.sample(&mut StdRng::seed_from_u64(1), 10);
        let b = weight_gen.sample(&mut StdRng::seed_from_u64(1), 10);

        assert_eq!(a, b);
    }
}
