use std::{cell::RefCell, rc::Rc};

use rand::rngs::StdRng;

use super::{Interceptor, Iteration};
use crate::{Result, data::CellSampler, sink::DataSink};

pub const LOSSES_GRAPH: &str = "losses";
pub const ACCURACY_GRAPH: &str = "accuracy";

/// Writes the losses of every iteration it sees to the `losses` graph.
pub struct SaveLosses {
    sink: Rc<RefCell<DataSink>>,
}

impl SaveLosses {
    /// Creates a new `SaveLosses`, declaring its graph in `sink`.
    pub fn new(sink: Rc<RefCell<DataSink>>) -> Result<Self> {
        sink.borrow_mut().add_graph_header(
            LOSSES_GRAPH,
            &["iteration", "total-loss", "g-loss", "e-loss", "d-loss"],
        )?;

        Ok(Self { sink })
    }
}

impl Interceptor for SaveLosses {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        let losses = &iteration.losses;
        let values = [
            iteration.it as f64,
            losses.total() as f64,
            losses.generator as f64,
            losses.encoder as f64,
            losses.discriminator as f64,
        ];

        self.sink.borrow_mut().add_data(LOSSES_GRAPH, &values)
    }
}

/// Measures the discriminator on a fresh batch and writes the fraction of real pairs judged
/// real and of generated pairs judged fake to the `accuracy` graph.
pub struct SaveAccuracy {
    sink: Rc<RefCell<DataSink>>,
    batch_size: usize,
    rng: StdRng,
}

impl SaveAccuracy {
    /// Creates a new `SaveAccuracy`, declaring its graph in `sink`.
    ///
    /// # Arguments
    /// * `sink` - Where to write.
    /// * `batch_size` - The size of the evaluation batches.
    /// * `rng` - The generator for the evaluation batches, independent from training.
    pub fn new(sink: Rc<RefCell<DataSink>>, batch_size: usize, rng: StdRng) -> Result<Self> {
        sink.borrow_mut()
            .add_graph_header(ACCURACY_GRAPH, &["iteration", "pos-pct", "neg-pct"])?;

        Ok(Self {
            sink,
            batch_size,
            rng,
        })
    }
}

impl Interceptor for SaveAccuracy {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        let view = iteration.view;
        let batch = CellSampler::new(view.matrix()).sample_with(self.batch_size, &mut self.rng)?;
        let accuracy = view.evaluate_accuracy(batch.cells.view(), &mut self.rng)?;

        let n = self.batch_size.max(1) as f64;
        let values = [
            iteration.it as f64,
            accuracy.true_positive as f64 / n,
            accuracy.true_negative as f64 / n,
        ];

        self.sink.borrow_mut().add_data(ACCURACY_GRAPH, &values)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, num::NonZeroUsize};

    use ndarray::Array2;
    use rand::SeedableRng;

    use super::*;
    use crate::{intercept::testing::FixedView, losses::{Accuracy, LossTuple}};

    fn shared_sink(dir: &std::path::Path) -> Rc<RefCell<DataSink>> {
        Rc::new(RefCell::new(DataSink::new(dir, NonZeroUsize::MIN).unwrap()))
    }

    #[test]
    fn losses_rows_follow_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = shared_sink(dir.path());
        let mut save = SaveLosses::new(Rc::clone(&sink)).unwrap();

        let view = FixedView::new(Array2::zeros((2, 3)));
        save.intercept(&Iteration {
            it: 3,
            losses: LossTuple::new(0.5, 0.25, 1.),
            view: &view,
        })
        .unwrap();

        let content = fs::read_to_string(sink.borrow().path(LOSSES_GRAPH)).unwrap();
        assert_eq!(
            content,
            "iteration,total-loss,g-loss,e-loss,d-loss\n3,1.75,0.5,0.25,1\n"
        );
    }

    #[test]
    fn accuracy_is_written_as_fractions_of_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let sink = shared_sink(dir.path());
        let rng = StdRng::seed_from_u64(0);
        let mut save = SaveAccuracy::new(Rc::clone(&sink), 4, rng).unwrap();

        let mut view = FixedView::new(Array2::zeros((5, 3)));
        view.accuracy = Accuracy {
            true_positive: 3,
            true_negative: 1,
        };
        save.intercept(&Iteration {
            it: 9,
            losses: LossTuple::default(),
            view: &view,
        })
        .unwrap();

        let content = fs::read_to_string(sink.borrow().path(ACCURACY_GRAPH)).unwrap();
        assert_eq!(content, "iteration,pos-pct,neg-pct\n9,0.75,0.25\n");
    }

    #[test]
    fn both_graphs_share_one_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = shared_sink(dir.path());

        SaveLosses::new(Rc::clone(&sink)).unwrap();
        SaveAccuracy::new(Rc::clone(&sink), 2, StdRng::seed_from_u64(0)).unwrap();

        assert!(SaveLosses::new(sink).is_err());
    }
}
