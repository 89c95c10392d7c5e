//! Bidirectional adversarial training of cell encodings from single-cell count matrices.
//!
//! A `CellMatrix` is loaded from sparse triples, batches of it are drawn by a `CellSampler` and
//! fed to an `AdversarialTrainer`, which updates a generator, an encoder and a discriminator in
//! a fixed four phase schedule. `CellTraining` drives the trainer for a number of iterations and
//! reports each one to an `Interceptor`, which is where logging, metrics and persistence live.

pub mod config;
pub mod data;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod intercept;
pub mod losses;
pub mod neural;
pub mod record;
pub mod sink;
pub mod trainer;
pub mod triad;

pub use config::RunConfig;
pub use data::{Batch, CellMatrix, CellSampler, Sources};
pub use driver::CellTraining;
pub use encoding::{OneHot, RandomEncodingStrategy, Regime, Uniform};
pub use error::{BiGanErr, Result};
pub use losses::{Accuracy, LossTuple};
pub use neural::{NeuralTriad, TriadConfig};
pub use trainer::{AdversarialTrainer, TargetLabels};
pub use triad::{FreezeLock, PhaseInput, Role, Triad, Unfrozen};
