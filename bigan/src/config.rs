use std::{fs, num::NonZeroUsize, path::Path};

use machine_learning::{
    arch::loss::{BinaryCrossEntropy, LossFn, Mse},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{BiGanErr, Result, encoding::Regime, neural::TriadConfig, trainer::TargetLabels};

const RECORDED_ENCODING_SIZE: usize = 3;

/// Creates the random number generator for a run.
///
/// # Arguments
/// * `seed` - If given, the generator is reproducible from it, otherwise it's seeded by the OS.
pub fn generate_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Which `Optimizer` to build, and its hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
}

impl OptimizerSpec {
    /// Builds an optimizer for `len` parameters.
    pub fn build(&self, len: usize) -> Box<dyn Optimizer + Send> {
        match *self {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, learning_rate, beta1, beta2, epsilon)),
            OptimizerSpec::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate))
            }
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => Box::new(GradientDescentWithMomentum::new(len, learning_rate, momentum)),
        }
    }
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        Self::Adam {
            learning_rate: 0.0002,
            beta1: 0.5,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Which `LossFn` to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
    #[default]
    BinaryCrossEntropy,
}

impl LossFnSpec {
    pub fn build(&self) -> Box<dyn LossFn + Send + Sync> {
        match self {
            LossFnSpec::Mse => Box::new(Mse::new()),
            LossFnSpec::BinaryCrossEntropy => Box::new(BinaryCrossEntropy::default()),
        }
    }
}

/// Everything that parametrizes a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub encoding_size: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub batches_per_iteration: NonZeroUsize,
    pub regime: Regime,
    pub labels: TargetLabels,
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    pub generator_hidden: Vec<usize>,
    pub encoder_hidden: Vec<usize>,
    pub discriminator_hidden: Vec<usize>,
    pub seed: Option<u64>,
    /// Print the losses every this many iterations.
    pub log_every: NonZeroUsize,
    /// Don't print the losses before this iteration.
    pub log_offset: usize,
    pub accuracy_every: NonZeroUsize,
    pub sink_batch_size: NonZeroUsize,
    pub snapshot_every: Option<NonZeroUsize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            encoding_size: NonZeroUsize::MIN.saturating_add(2),
            batch_size: NonZeroUsize::MIN.saturating_add(63),
            batches_per_iteration: NonZeroUsize::MIN,
            regime: Regime::Continuous,
            labels: TargetLabels::default(),
            optimizer: OptimizerSpec::default(),
            loss: LossFnSpec::default(),
            generator_hidden: vec![64, 256],
            encoder_hidden: vec![256, 64],
            discriminator_hidden: vec![256, 64],
            seed: None,
            log_every: NonZeroUsize::MIN,
            log_offset: 0,
            accuracy_every: NonZeroUsize::MIN.saturating_add(9),
            sink_batch_size: NonZeroUsize::MIN,
            snapshot_every: None,
        }
    }
}

impl RunConfig {
    /// Reads a configuration from a JSON file, missing fields take their default value.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(BiGanErr::MissingFile(path.to_path_buf()));
        }

        let config: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values no type can rule out.
    ///
    /// # Errors
    /// `InvalidConfig` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        let TargetLabels { real, fake } = self.labels;
        if !(0.0..=1.0).contains(&real) || !(0.0..=1.0).contains(&fake) {
            return Err(BiGanErr::InvalidConfig(format!(
                "target labels must lie in [0, 1], got real = {real} and fake = {fake}"
            )));
        }

        let hidden = [
            ("generator_hidden", &self.generator_hidden),
            ("encoder_hidden", &self.encoder_hidden),
            ("discriminator_hidden", &self.discriminator_hidden),
        ];
        for (name, widths) in hidden {
            if widths.contains(&0) {
                return Err(BiGanErr::InvalidConfig(format!(
                    "{name} has a layer of width 0"
                )));
            }
        }

        Ok(())
    }

    /// Checks the configuration can be recorded into a document store, whose iterations hold
    /// 3-dimensional coordinates.
    pub fn validate_recording(&self) -> Result<()> {
        if self.encoding_size.get() != RECORDED_ENCODING_SIZE {
            return Err(BiGanErr::InvalidConfig(format!(
                "recorded runs need an encoding size of {RECORDED_ENCODING_SIZE}, got {}",
                self.encoding_size
            )));
        }

        Ok(())
    }

    /// The shape of the three networks for cells of `gene_size` genes.
    pub fn triad_config(&self, gene_size: usize) -> TriadConfig {
        TriadConfig {
            encoding_size: self.encoding_size.get(),
            gene_size,
            generator_hidden: self.generator_hidden.clone(),
            encoder_hidden: self.encoder_hidden.clone(),
            discriminator_hidden: self.discriminator_hidden.clone(),
            optimizer: self.optimizer,
            loss: self.loss,
        }
    }
}
