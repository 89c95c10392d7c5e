use std::{num::NonZeroUsize, path::PathBuf};

use bigan::{Regime, Result, RunConfig};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Trains bidirectional adversarial encoders of single-cell count matrices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Train a run on a count matrix
    Train(TrainArgs),

    /// Store the encoding snapshots saved by a run
    Import(ImportArgs),

    /// Store the cells of a count matrix, with the genes each one expresses
    Cells(CellsArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RegimeArg {
    Categorical,
    Continuous,
}

impl From<RegimeArg> for Regime {
    fn from(value: RegimeArg) -> Self {
        match value {
            RegimeArg::Categorical => Regime::Categorical,
            RegimeArg::Continuous => Regime::Continuous,
        }
    }
}

#[derive(Args)]
pub struct TrainArgs {
    /// Directory holding matrix.mtx, genes.tsv and barcodes.tsv, or the matrix.mtx itself
    #[arg(long, value_hint = ValueHint::AnyPath)]
    pub matrix: PathBuf,

    /// Name of the run, a timestamp if not given
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long, default_value_t = 1000)]
    pub iterations: usize,

    /// JSON run configuration, missing fields take their defaults
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The metrics of a run go to <log-root>/<run-id>
    #[arg(long, default_value = "logs", value_hint = ValueHint::DirPath)]
    pub log_root: PathBuf,

    /// Record the encodings into the document store at this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub store: Option<PathBuf>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub batch_size: Option<NonZeroUsize>,

    #[arg(long)]
    pub encoding_size: Option<NonZeroUsize>,

    #[arg(long, value_enum)]
    pub regime: Option<RegimeArg>,
}

impl TrainArgs {
    /// The configuration file, or the defaults, with the flags given on the command line on top.
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(encoding_size) = self.encoding_size {
            config.encoding_size = encoding_size;
        }
        if let Some(regime) = self.regime {
            config.regime = regime.into();
        }

        config.validate()?;
        if self.store.is_some() {
            config.validate_recording()?;
        }

        Ok(config)
    }
}

#[derive(Args)]
pub struct ImportArgs {
    /// The document store directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub store: PathBuf,

    #[arg(long)]
    pub run_id: String,

    /// Directory of the snapshots written during training
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub snapshots: PathBuf,

    /// The matrix the run was trained on
    #[arg(long, value_hint = ValueHint::AnyPath)]
    pub matrix: PathBuf,
}

#[derive(Args)]
pub struct CellsArgs {
    /// The document store directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub store: PathBuf,

    /// Directory holding matrix.mtx, genes.tsv and barcodes.tsv, or the matrix.mtx itself
    #[arg(long, value_hint = ValueHint::AnyPath)]
    pub matrix: PathBuf,
}
