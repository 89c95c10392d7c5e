use log::debug;
use ndarray::{Array1, ArrayView2};
use rand::{RngCore, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    encoding::RandomEncodingStrategy,
    losses::{Accuracy, LossTuple},
    triad::{FreezeLock, PhaseInput, Role, Triad},
};

/// The discriminator's probability above which a pair counts as judged real.
const DECISION_THRESHOLD: f32 = 0.5;

/// The discriminator targets standing for "real" and "fake".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetLabels {
    pub real: f32,
    pub fake: f32,
}

impl Default for TargetLabels {
    fn default() -> Self {
        Self {
            real: 0.95,
            fake: 0.,
        }
    }
}

/// Runs the adversarial update schedule over a triad.
///
/// Every step goes through four phases in a fixed order, each with exactly one component
/// unfrozen:
///   1. the generator learns to make the discriminator call its output real,
///   2. the encoder learns to make the discriminator call its output fake,
///   3. the discriminator learns to call generated pairs fake,
///   4. the discriminator learns to call encoded pairs real.
pub struct AdversarialTrainer<T, S> {
    triad: T,
    strategy: S,
    labels: TargetLabels,
    lock: FreezeLock,
    rng: StdRng,
}

impl<T, S> AdversarialTrainer<T, S>
where
    T: Triad,
    S: RandomEncodingStrategy,
{
    /// Creates a new `AdversarialTrainer`.
    ///
    /// # Arguments
    /// * `triad` - The components to train, owned by the trainer from now on.
    /// * `strategy` - How random encodings are drawn.
    /// * `labels` - The real and fake targets.
    /// * `rng` - The generator for the random encodings.
    ///
    /// # Returns
    /// A new `AdversarialTrainer` instance.
    pub fn new(triad: T, strategy: S, labels: TargetLabels, rng: StdRng) -> Self {
        Self {
            triad,
            strategy,
            labels,
            lock: FreezeLock::new(),
            rng,
        }
    }

    pub fn triad(&self) -> &T {
        &self.triad
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn labels(&self) -> TargetLabels {
        self.labels
    }

    /// Runs one full adversarial step over a batch of real cells.
    ///
    /// # Arguments
    /// * `batch` - The real cells, must not be empty.
    ///
    /// # Returns
    /// The generator, encoder and discriminator losses, the latter being the mean of its two
    /// updates.
    pub fn trainings_step(&mut self, batch: ArrayView2<f32>) -> Result<LossTuple> {
        let n = batch.nrows();
        let width = self.triad.encoding_size();
        let real = Array1::from_elem(n, self.labels.real);
        let fake = Array1::from_elem(n, self.labels.fake);

        let generator = {
            let encodings = self.strategy.sample(n, width, &mut self.rng);
            let token = self.lock.unfreeze(Role::Generator);
            let input = PhaseInput::Generator {
                encodings: encodings.view(),
            };
            self.triad.train_on_batch(&token, input, real.view())?
        };
        debug!("generator phase loss: {generator}");

        let encoder = {
            let token = self.lock.unfreeze(Role::Encoder);
            let input = PhaseInput::Encoder { cells: batch };
            self.triad.train_on_batch(&token, input, fake.view())?
        };
        debug!("encoder phase loss: {encoder}");

        let discriminator = {
            let encodings = self.strategy.sample(n, width, &mut self.rng);
            let generated = self.triad.generate(encodings.view())?.mapv_into(f32::round);
            let encoded = self.strategy.canonicalize(self.triad.encode(batch)?);

            let token = self.lock.unfreeze(Role::Discriminator);
            let on_generated = PhaseInput::Discriminator {
                encodings: encodings.view(),
                cells: generated.view(),
            };
            let loss_fake = self.triad.train_on_batch(&token, on_generated, fake.view())?;

            let on_encoded = PhaseInput::Discriminator {
                encodings: encoded.view(),
                cells: batch,
            };
            let loss_real = self.triad.train_on_batch(&token, on_encoded, real.view())?;

            (loss_fake + loss_real) / 2.
        };
        debug!("discriminator phase loss: {discriminator}");

        Ok(LossTuple::new(generator, encoder, discriminator))
    }

    /// Measures how well the discriminator tells pairs apart, without training anything.
    ///
    /// # Arguments
    /// * `batch` - The real cells.
    /// * `rng` - The generator for the random encodings the fake pairs are made of.
    ///
    /// # Returns
    /// The amount of real pairs judged real and of generated pairs judged fake.
    pub fn evaluate_accuracy(
        &self,
        batch: ArrayView2<f32>,
        rng: &mut dyn RngCore,
    ) -> Result<Accuracy> {
        let n = batch.nrows();

        let encoded = self.strategy.canonicalize(self.triad.encode(batch)?);
        let on_real = self.triad.discriminate(encoded.view(), batch)?;

        let encodings = self.strategy.sample(n, self.triad.encoding_size(), rng);
        let generated = self.triad.generate(encodings.view())?.mapv_into(f32::round);
        let on_fake = self.triad.discriminate(encodings.view(), generated.view())?;

        Ok(Accuracy {
            true_positive: on_real.iter().filter(|&&p| p > DECISION_THRESHOLD).count(),
            true_negative: on_fake.iter().filter(|&&p| p < DECISION_THRESHOLD).count(),
        })
    }
}
