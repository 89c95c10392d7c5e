use machine_learning::{
    arch::{Sequential, activations::ActFn, layers::Dense, loss::LossFn},
    optimization::Optimizer,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate};
use rand::Rng;

use crate::{
    BiGanErr, Result,
    config::{LossFnSpec, OptimizerSpec},
    triad::{PhaseInput, Role, Triad, Unfrozen},
};

/// The shape and training setup of a `NeuralTriad`.
#[derive(Debug, Clone)]
pub struct TriadConfig {
    pub encoding_size: usize,
    pub gene_size: usize,
    pub generator_hidden: Vec<usize>,
    pub encoder_hidden: Vec<usize>,
    pub discriminator_hidden: Vec<usize>,
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
}

/// A network together with the optimizer that updates it.
struct Component {
    net: Sequential,
    optimizer: Box<dyn Optimizer + Send>,
}

impl Component {
    fn new<R: Rng + ?Sized>(
        widths: &[usize],
        output: ActFn,
        optimizer: &OptimizerSpec,
        rng: &mut R,
    ) -> Result<Self> {
        let last = widths.len().saturating_sub(2);
        let layers = widths.windows(2).enumerate().map(|(i, dim)| {
            let act_fn = if i == last {
                output.clone()
            } else {
                ActFn::relu()
            };

            Dense::new((dim[0], dim[1]), Some(act_fn))
        });

        let mut net = Sequential::new(layers)?;
        net.init_xavier(rng)?;
        let optimizer = optimizer.build(net.size());

        Ok(Self { net, optimizer })
    }

    fn step(&mut self) -> Result<()> {
        Ok(self.net.step(self.optimizer.as_mut())?)
    }
}

/// A triad of dense networks.
///
/// * generator: `encoding → cell`, relu output since counts are non negative.
/// * encoder: `cell → encoding`, sigmoid output so encodings lie in the unit interval.
/// * discriminator: `[encoding | cell] → p(real)`, sigmoid output.
///
/// Generator and encoder are trained by back propagating the loss through the discriminator,
/// whose gradient is computed but never applied.
pub struct NeuralTriad {
    generator: Component,
    encoder: Component,
    discriminator: Component,
    loss_fn: Box<dyn LossFn + Send + Sync>,
    encoding_size: usize,
    gene_size: usize,
}

impl NeuralTriad {
    /// Creates a new `NeuralTriad` with Xavier initialized weights.
    ///
    /// # Arguments
    /// * `config` - The widths of the networks and how to train them.
    /// * `rng` - The generator for the initial weights.
    ///
    /// # Returns
    /// A new `NeuralTriad` or `InvalidConfig` if a width is zero.
    pub fn new<R: Rng + ?Sized>(config: &TriadConfig, rng: &mut R) -> Result<Self> {
        let TriadConfig {
            encoding_size: k,
            gene_size: g,
            ..
        } = *config;

        if k == 0 || g == 0 {
            return Err(BiGanErr::InvalidConfig(format!(
                "encoding size ({k}) and gene size ({g}) must be positive"
            )));
        }

        let widths = |input: usize, hidden: &[usize], output: usize| {
            let mut widths = vec![input];
            widths.extend_from_slice(hidden);
            widths.push(output);
            widths
        };

        let generator = Component::new(
            &widths(k, &config.generator_hidden, g),
            ActFn::relu(),
            &config.optimizer,
            rng,
        )?;
        let encoder = Component::new(
            &widths(g, &config.encoder_hidden, k),
            ActFn::sigmoid(1.),
            &config.optimizer,
            rng,
        )?;
        let discriminator = Component::new(
            &widths(k + g, &config.discriminator_hidden, 1),
            ActFn::sigmoid(1.),
            &config.optimizer,
            rng,
        )?;

        Ok(Self {
            generator,
            encoder,
            discriminator,
            loss_fn: config.loss.build(),
            encoding_size: k,
            gene_size: g,
        })
    }

    /// The current parameters of a component.
    pub fn params(&self, role: Role) -> &[f32] {
        self.network(role).params()
    }

    pub fn network(&self, role: Role) -> &Sequential {
        match role {
            Role::Generator => &self.generator.net,
            Role::Encoder => &self.encoder.net,
            Role::Discriminator => &self.discriminator.net,
        }
    }

    fn joint(&self, encodings: ArrayView2<f32>, cells: ArrayView2<f32>) -> Result<Array2<f32>> {
        if encodings.nrows() != cells.nrows() {
            return Err(BiGanErr::DimensionMismatch {
                what: "encodings and cells rows",
                got: cells.nrows(),
                expected: encodings.nrows(),
            });
        }

        concatenate(Axis(1), &[encodings, cells]).map_err(|_| BiGanErr::DimensionMismatch {
            what: "discriminator input columns",
            got: encodings.ncols() + cells.ncols(),
            expected: self.encoding_size + self.gene_size,
        })
    }

    /// Judges the pairs with the discriminator and back propagates the loss to its input,
    /// leaving its parameters untouched.
    ///
    /// # Returns
    /// The loss and its derivative with respect to each column of `[encodings | cells]`.
    fn through_discriminator(
        &mut self,
        encodings: ArrayView2<f32>,
        cells: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<(f32, Array2<f32>)> {
        let x = self.joint(encodings, cells)?;
        let y_pred = self.discriminator.net.forward(x.view())?;

        let loss = self.loss_fn.loss(y_pred.view(), y);
        let d = self.loss_fn.loss_prime(y_pred.view(), y);
        let d_input = self.discriminator.net.backward(d)?;

        Ok((loss, d_input))
    }
}

impl Triad for NeuralTriad {
    fn encoding_size(&self) -> usize {
        self.encoding_size
    }

    fn gene_size(&self) -> usize {
        self.gene_size
    }

    fn generate(&self, encodings: ArrayView2<f32>) -> Result<Array2<f32>> {
        Ok(self.generator.net.predict(encodings)?)
    }

    fn encode(&self, cells: ArrayView2<f32>) -> Result<Array2<f32>> {
        Ok(self.encoder.net.predict(cells)?)
    }

    fn discriminate(
        &self,
        encodings: ArrayView2<f32>,
        cells: ArrayView2<f32>,
    ) -> Result<Array1<f32>> {
        let x = self.joint(encodings, cells)?;
        let p = self.discriminator.net.predict(x.view())?;
        Ok(p.index_axis_move(Axis(1), 0))
    }

    fn train_on_batch(
        &mut self,
        unfrozen: &Unfrozen<'_>,
        input: PhaseInput<'_>,
        targets: ArrayView1<f32>,
    ) -> Result<f32> {
        unfrozen.check(input.role())?;

        if targets.len() != input.nrows() {
            return Err(BiGanErr::DimensionMismatch {
                what: "targets",
                got: targets.len(),
                expected: input.nrows(),
            });
        }
        let y = targets.insert_axis(Axis(1));
        let k = self.encoding_size;

        match input {
            PhaseInput::Generator { encodings } => {
                let generated = self.generator.net.forward(encodings)?;
                let (loss, d_input) = self.through_discriminator(encodings, generated.view(), y)?;

                let (_, d_cells) = d_input.view().split_at(Axis(1), k);
                self.generator.net.backward(d_cells.to_owned())?;
                self.generator.step()?;
                Ok(loss)
            }
            PhaseInput::Encoder { cells } => {
                let encoded = self.encoder.net.forward(cells)?;
                let (loss, d_input) = self.through_discriminator(encoded.view(), cells, y)?;

                let (d_encodings, _) = d_input.view().split_at(Axis(1), k);
                self.encoder.net.backward(d_encodings.to_owned())?;
                self.encoder.step()?;
                Ok(loss)
            }
            PhaseInput::Discriminator { encodings, cells } => {
                let x = self.joint(encodings, cells)?;
                let Component { net, optimizer } = &mut self.discriminator;
                Ok(net.train_on_batch(x.view(), y, self.loss_fn.as_ref(), optimizer.as_mut())?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::triad::FreezeLock;

    fn config() -> TriadConfig {
        TriadConfig {
            encoding_size: 3,
            gene_size: 5,
            generator_hidden: vec![4],
            encoder_hidden: vec![4],
            discriminator_hidden: vec![6],
            optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.1 },
            loss: LossFnSpec::BinaryCrossEntropy,
        }
    }

    fn triad() -> NeuralTriad {
        NeuralTriad::new(&config(), &mut StdRng::seed_from_u64(11)).unwrap()
    }

    fn snapshot(triad: &NeuralTriad) -> [Vec<f32>; 3] {
        [Role::Generator, Role::Encoder, Role::Discriminator].map(|r| triad.params(r).to_vec())
    }

    fn cells() -> Array2<f32> {
        Array2::from_shape_fn((4, 5), |(i, j)| ((i + j) % 3) as f32)
    }

    fn encodings() -> Array2<f32> {
        Array2::from_shape_fn((4, 3), |(i, j)| ((i * 3 + j) % 5) as f32 / 5.)
    }

    #[test]
    fn shapes_follow_the_config() {
        let triad = triad();

        assert_eq!(triad.network(Role::Generator).input_size(), 3);
        assert_eq!(triad.network(Role::Generator).output_size(), 5);
        assert_eq!(triad.network(Role::Encoder).output_size(), 3);
        assert_eq!(triad.network(Role::Discriminator).input_size(), 8);

        assert_eq!(triad.generate(encodings().view()).unwrap().dim(), (4, 5));
        assert_eq!(triad.encode(cells().view()).unwrap().dim(), (4, 3));

        let p = triad.discriminate(encodings().view(), cells().view()).unwrap();
        assert_eq!(p.len(), 4);
        assert!(p.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn encodings_lie_in_the_unit_interval() {
        let encoded = triad().encode((cells() * 100.).view()).unwrap();
        assert!(encoded.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn generator_phase_only_moves_the_generator() {
        let mut triad = triad();
        let mut lock = FreezeLock::new();
        let before = snapshot(&triad);

        let z = encodings();
        let token = lock.unfreeze(Role::Generator);
        let input = PhaseInput::Generator { encodings: z.view() };
        let loss = triad.train_on_batch(&token, input, Array1::from_elem(4, 0.95).view()).unwrap();
        let after = snapshot(&triad);

        assert!(loss.is_finite() && loss >= 0.);
        assert_eq!(before[1], after[1]);
        assert_eq!(before[2], after[2]);
        assert_ne!(before[0], after[0]);
    }

    #[test]
    fn encoder_phase_only_moves_the_encoder() {
        let mut triad = triad();
        let mut lock = FreezeLock::new();
        let before = snapshot(&triad);

        let x = cells();
        let token = lock.unfreeze(Role::Encoder);
        let input = PhaseInput::Encoder { cells: x.view() };
        triad.train_on_batch(&token, input, Array1::zeros(4).view()).unwrap();
        let after = snapshot(&triad);

        assert_eq!(before[0], after[0]);
        assert_eq!(before[2], after[2]);
        assert_ne!(before[1], after[1]);
    }

    #[test]
    fn discriminator_phase_only_moves_the_discriminator() {
        let mut triad = triad();
        let mut lock = FreezeLock::new();
        let before = snapshot(&triad);

        let (z, x) = (encodings(), cells());
        let token = lock.unfreeze(Role::Discriminator);
        let input = PhaseInput::Discriminator {
            encodings: z.view(),
            cells: x.view(),
        };
        triad.train_on_batch(&token, input, Array1::ones(4).view()).unwrap();
        let after = snapshot(&triad);

        assert_eq!(before[0], after[0]);
        assert_eq!(before[1], after[1]);
        assert_ne!(before[2], after[2]);
    }

    #[test]
    fn training_with_the_wrong_token_is_refused() {
        let mut triad = triad();
        let mut lock = FreezeLock::new();
        let before = snapshot(&triad);

        let x = cells();
        let token = lock.unfreeze(Role::Discriminator);
        let input = PhaseInput::Encoder { cells: x.view() };
        let err = triad.train_on_batch(&token, input, Array1::zeros(4).view());

        assert!(matches!(err, Err(BiGanErr::FrozenComponent { .. })));
        assert_eq!(before, snapshot(&triad));
    }

    #[test]
    fn targets_must_match_the_batch() {
        let mut triad = triad();
        let mut lock = FreezeLock::new();

        let x = cells();
        let token = lock.unfreeze(Role::Encoder);
        let input = PhaseInput::Encoder { cells: x.view() };
        let err = triad.train_on_batch(&token, input, Array1::zeros(3).view());

        assert!(matches!(err, Err(BiGanErr::DimensionMismatch { .. })));
    }

    #[test]
    fn zero_encoding_size_is_invalid() {
        let config = TriadConfig {
            encoding_size: 0,
            ..config()
        };

        let err = NeuralTriad::new(&config, &mut StdRng::seed_from_u64(0));
        assert!(matches!(err, Err(BiGanErr::InvalidConfig(_))));
    }
}
