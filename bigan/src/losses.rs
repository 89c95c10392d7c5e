use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// The losses of one training step, or their sum over several sub-batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossTuple {
    pub generator: f32,
    pub encoder: f32,
    pub discriminator: f32,
}

impl LossTuple {
    pub fn new(generator: f32, encoder: f32, discriminator: f32) -> Self {
        Self {
            generator,
            encoder,
            discriminator,
        }
    }

    pub fn total(&self) -> f32 {
        self.generator + self.encoder + self.discriminator
    }

    /// The losses as a `[generator, encoder, discriminator]` array.
    pub fn to_array(&self) -> [f32; 3] {
        [self.generator, self.encoder, self.discriminator]
    }
}

impl Add for LossTuple {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            generator: self.generator + rhs.generator,
            encoder: self.encoder + rhs.encoder,
            discriminator: self.discriminator + rhs.discriminator,
        }
    }
}

impl AddAssign for LossTuple {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// How many samples of a batch the discriminator judged right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accuracy {
    /// Real pairs judged real.
    pub true_positive: usize,
    /// Generated pairs judged fake.
    pub true_negative: usize,
}
