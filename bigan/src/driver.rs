use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use rand::{RngCore, rngs::StdRng};

use crate::{
    Result,
    config::generate_rng,
    data::{CellMatrix, CellSampler},
    encoding::RandomEncodingStrategy,
    intercept::{Interceptor, Iteration, TrainingView},
    losses::{Accuracy, LossTuple},
    trainer::AdversarialTrainer,
    triad::Triad,
};

/// Drives an `AdversarialTrainer` over a matrix for a number of iterations.
///
/// Each iteration draws `batches_per_iteration` batches, makes one step per batch and hands the
/// summed losses to the interceptor. The driver does no I/O of its own.
pub struct CellTraining<T, S> {
    matrix: CellMatrix,
    trainer: AdversarialTrainer<T, S>,
    batch_size: NonZeroUsize,
    batches_per_iteration: NonZeroUsize,
    rng: StdRng,
    stop: Option<Arc<AtomicBool>>,
}

impl<T, S> CellTraining<T, S>
where
    T: Triad,
    S: RandomEncodingStrategy,
{
    /// Creates a new `CellTraining`.
    ///
    /// # Arguments
    /// * `matrix` - The cells to train on.
    /// * `trainer` - The trainer, owning the triad.
    /// * `batch_size` - The amount of cells per batch.
    /// * `seed` - The seed for batch sampling, the same seed draws the same batches.
    ///
    /// # Returns
    /// A new `CellTraining` instance that makes one step per iteration.
    pub fn new(
        matrix: CellMatrix,
        trainer: AdversarialTrainer<T, S>,
        batch_size: NonZeroUsize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            matrix,
            trainer,
            batch_size,
            batches_per_iteration: NonZeroUsize::MIN,
            rng: generate_rng(seed),
            stop: None,
        }
    }

    /// Makes every iteration go over `n` batches, summing their losses.
    pub fn with_batches_per_iteration(mut self, n: NonZeroUsize) -> Self {
        self.batches_per_iteration = n;
        self
    }

    /// Makes `run` return early once `flag` is raised. The flag is only looked at between
    /// iterations, a step is never interrupted half way.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn trainer(&self) -> &AdversarialTrainer<T, S> {
        &self.trainer
    }

    /// Runs the training loop.
    ///
    /// # Arguments
    /// * `iterations` - The amount of iterations, numbered from 0.
    /// * `interceptor` - Called exactly once after each iteration, in the calling thread.
    ///
    /// # Returns
    /// The amount of iterations completed, less than `iterations` only if stopped, or the first
    /// error raised by training or by the interceptor.
    pub fn run(
        &mut self,
        iterations: usize,
        mut interceptor: Option<&mut dyn Interceptor>,
    ) -> Result<usize> {
        info!(
            "training for {iterations} iterations of {} x {} cells",
            self.batches_per_iteration, self.batch_size
        );

        for it in 0..iterations {
            if self.stopped() {
                info!("stop requested, leaving after {it} iterations");
                return Ok(it);
            }

            let losses = self.iteration()?;
            debug!("iteration {it} done, total loss {}", losses.total());

            if let Some(interceptor) = interceptor.as_deref_mut() {
                let view: &dyn TrainingView = &*self;
                interceptor.intercept(&Iteration { it, losses, view })?;
            }
        }

        Ok(iterations)
    }

    /// Runs a single iteration: one step per sub-batch, losses summed elementwise.
    pub fn iteration(&mut self) -> Result<LossTuple> {
        let sampler = CellSampler::new(&self.matrix);
        let mut losses = LossTuple::default();

        for _ in 0..self.batches_per_iteration.get() {
            let batch = sampler.sample_with(self.batch_size.get(), &mut self.rng)?;
            losses += self.trainer.trainings_step(batch.cells.view())?;
        }

        Ok(losses)
    }

    fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl<T, S> TrainingView for CellTraining<T, S>
where
    T: Triad,
    S: RandomEncodingStrategy,
{
    fn matrix(&self) -> &CellMatrix {
        &self.matrix
    }

    fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    fn encode(&self, cells: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.trainer.triad().encode(cells)
    }

    fn evaluate_accuracy(
        &self,
        batch: ArrayView2<f32>,
        rng: &mut dyn RngCore,
    ) -> Result<Accuracy> {
        self.trainer.evaluate_accuracy(batch, rng)
    }
}
