//! Observers called after every training iteration.
//!
//! Interceptors run synchronously, in order, on the training thread. They may read the state
//! of the training through a `TrainingView` but can't modify it; their only effects are
//! logging and persistence.

mod combinators;
mod metrics;
mod print;
mod snapshot;

pub use combinators::{Combined, Offset, Skip, combine, offset, skip};
pub use metrics::{ACCURACY_GRAPH, LOSSES_GRAPH, SaveAccuracy, SaveLosses};
pub use print::PrintLosses;
pub use snapshot::{SaveEncodings, Snapshot};

use ndarray::{Array2, ArrayView2};
use rand::RngCore;

use crate::{
    Result,
    data::CellMatrix,
    losses::{Accuracy, LossTuple},
};

/// Read only access to a training in progress.
pub trait TrainingView {
    /// The matrix being trained on.
    fn matrix(&self) -> &CellMatrix;

    /// The size of the training batches.
    fn batch_size(&self) -> usize;

    /// Encodes cells with the current encoder.
    fn encode(&self, cells: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// See `AdversarialTrainer::evaluate_accuracy`.
    fn evaluate_accuracy(&self, batch: ArrayView2<f32>, rng: &mut dyn RngCore)
    -> Result<Accuracy>;
}

/// What an interceptor is called with after each iteration.
#[derive(Clone, Copy)]
pub struct Iteration<'a> {
    pub it: usize,
    pub losses: LossTuple,
    pub view: &'a dyn TrainingView,
}

pub trait Interceptor {
    /// Observes a finished iteration. An error stops the training.
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()>;
}

impl<I: Interceptor + ?Sized> Interceptor for Box<I> {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        (**self).intercept(iteration)
    }
}

impl<I: Interceptor + ?Sized> Interceptor for &mut I {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        (**self).intercept(iteration)
    }
}

/// An interceptor made of a closure over the iteration number and its losses.
pub struct FromFn<F> {
    f: F,
}

/// Wraps `f` into an interceptor.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(usize, &LossTuple) -> Result<()>,
{
    FromFn { f }
}

impl<F> Interceptor for FromFn<F>
where
    F: FnMut(usize, &LossTuple) -> Result<()>,
{
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        (self.f)(iteration.it, &iteration.losses)
    }
}
