use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{BiGanErr, Result};

/// The three trainable components of a BiGAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Generator,
    Encoder,
    Discriminator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Generator => "generator",
            Role::Encoder => "encoder",
            Role::Discriminator => "discriminator",
        };

        f.write_str(s)
    }
}

/// Hands out the right to update exactly one component at a time.
///
/// `unfreeze` borrows the lock mutably, so while an `Unfrozen` token is alive no other token can
/// be created.
#[derive(Debug, Default)]
pub struct FreezeLock {
    active: Option<Role>,
}

impl FreezeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unfreezes `role`, every other component stays frozen until the token is dropped.
    pub fn unfreeze(&mut self, role: Role) -> Unfrozen<'_> {
        self.active = Some(role);
        Unfrozen { lock: self, role }
    }

    /// Returns the currently unfrozen component, if any.
    pub fn active(&self) -> Option<Role> {
        self.active
    }
}

/// Proof that a component is the unfrozen one. Freezes it again on drop.
#[derive(Debug)]
pub struct Unfrozen<'a> {
    lock: &'a mut FreezeLock,
    role: Role,
}

impl Unfrozen<'_> {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Checks that `role` is the one this token unfroze.
    ///
    /// # Errors
    /// `FrozenComponent` if it isn't.
    pub fn check(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(BiGanErr::FrozenComponent {
                role,
                unfrozen: self.role,
            });
        }

        Ok(())
    }
}

impl Drop for Unfrozen<'_> {
    fn drop(&mut self) {
        self.lock.active = None;
    }
}

/// The input of a single training call, one variant per trainable component.
///
/// Generator and encoder are trained through the discriminator: the generator is fed random
/// encodings and the encoder real cells, the discriminator sees their output and judges it
/// against the targets without being updated.
#[derive(Debug, Clone, Copy)]
pub enum PhaseInput<'a> {
    Generator {
        encodings: ArrayView2<'a, f32>,
    },
    Encoder {
        cells: ArrayView2<'a, f32>,
    },
    Discriminator {
        encodings: ArrayView2<'a, f32>,
        cells: ArrayView2<'a, f32>,
    },
}

impl PhaseInput<'_> {
    /// The component this input trains.
    pub fn role(&self) -> Role {
        match self {
            PhaseInput::Generator { .. } => Role::Generator,
            PhaseInput::Encoder { .. } => Role::Encoder,
            PhaseInput::Discriminator { .. } => Role::Discriminator,
        }
    }

    /// The amount of samples in the input.
    pub fn nrows(&self) -> usize {
        match self {
            PhaseInput::Generator { encodings } => encodings.nrows(),
            PhaseInput::Encoder { cells } => cells.nrows(),
            PhaseInput::Discriminator { encodings, .. } => encodings.nrows(),
        }
    }
}

/// A generator, an encoder and a discriminator trained together.
///
/// The prediction methods never modify any parameter. `train_on_batch` makes a single gradient
/// step on the component the input is meant for, and only if `unfrozen` is that component's
/// token.
pub trait Triad {
    /// The width of an encoding.
    fn encoding_size(&self) -> usize;

    /// The width of a cell, the amount of genes.
    fn gene_size(&self) -> usize;

    /// Maps encodings to synthetic cells.
    fn generate(&self, encodings: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Maps cells to encodings.
    fn encode(&self, cells: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// The probability of each `(encoding, cell)` row pair being real.
    fn discriminate(&self, encodings: ArrayView2<f32>, cells: ArrayView2<f32>)
    -> Result<Array1<f32>>;

    /// Makes one gradient step on the component `input` is meant for.
    ///
    /// # Arguments
    /// * `unfrozen` - The token of the component being trained.
    /// * `input` - The phase's input batch.
    /// * `targets` - The discriminator's expected output for every row of the batch.
    ///
    /// # Returns
    /// The loss of the batch, or `FrozenComponent` if `unfrozen` is another component's token.
    fn train_on_batch(
        &mut self,
        unfrozen: &Unfrozen<'_>,
        input: PhaseInput<'_>,
        targets: ArrayView1<f32>,
    ) -> Result<f32>;
}
