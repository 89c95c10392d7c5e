use chrono::Local;
use log::info;

use super::{Interceptor, Iteration};
use crate::Result;

/// Logs the losses of every iteration it sees.
pub struct PrintLosses {
    run_id: String,
}

impl PrintLosses {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// The line logged for an iteration.
    pub fn line(&self, iteration: &Iteration<'_>) -> String {
        let losses = &iteration.losses;

        format!(
            "[{}] {} it: {:6}  TOT: {:.4}  G-L: {:.4}  E-L: {:.4}  D-L: {:.4}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.run_id,
            iteration.it,
            losses.total(),
            losses.generator,
            losses.encoder,
            losses.discriminator,
        )
    }
}

impl Interceptor for PrintLosses {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        info!("{}", self.line(iteration));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::{intercept::testing::FixedView, losses::LossTuple};

    #[test]
    fn line_carries_run_iteration_and_losses() {
        let view = FixedView::new(Array2::zeros((1, 3)));
        let printer = PrintLosses::new("run-a");

        let line = printer.line(&Iteration {
            it: 42,
            losses: LossTuple::new(0.5, 0.25, 1.),
            view: &view,
        });

        assert!(line.ends_with(
            "run-a it:     42  TOT: 1.7500  G-L: 0.5000  E-L: 0.2500  D-L: 1.0000"
        ));
    }
}
