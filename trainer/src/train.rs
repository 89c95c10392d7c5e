use std::{
    cell::RefCell,
    io,
    num::NonZeroUsize,
    path::PathBuf,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bigan::{
    AdversarialTrainer, BiGanErr, CellMatrix, CellTraining, NeuralTriad, RunConfig, Sources,
    config::generate_rng,
    intercept::{
        Interceptor, PrintLosses, SaveAccuracy, SaveEncodings, SaveLosses, combine, offset, skip,
    },
    record::{DocumentStore, EncodingRecorder, JsonDirStore, RecordEncodings},
    sink::DataSink,
};
use chrono::Local;
use log::{info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{signal, task};

use crate::cli::TrainArgs;

const SNAPSHOT_DIR: &str = "encodings";

/// How a training session ended.
pub enum Outcome {
    Finished,
    Interrupted,
}

/// Everything a training needs, gathered and checked before any network is built.
struct Session {
    run_id: String,
    config: RunConfig,
    iterations: usize,
    matrix: CellMatrix,
    log_dir: PathBuf,
    recorder: Option<EncodingRecorder<JsonDirStore>>,
    stop: Arc<AtomicBool>,
}

/// What `preflight` vouches for.
struct Checked {
    run_id: String,
    config: RunConfig,
    log_dir: PathBuf,
    store: Option<JsonDirStore>,
}

/// Checks everything a run can be refused for, before any data is loaded.
///
/// # Errors
/// `NotFound` if the matrix files are missing, `AlreadyExists` if the run already has a log
/// directory or a record in the store, `InvalidData` for an invalid configuration.
fn preflight(args: &TrainArgs) -> io::Result<Checked> {
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());

    let config = args.run_config()?;
    Sources::locate(&args.matrix)?;

    let log_dir = args.log_root.join(&run_id);
    if log_dir.exists() {
        return Err(BiGanErr::DuplicateRun(run_id).into());
    }

    let store = match &args.store {
        Some(root) => {
            let store = JsonDirStore::open(root)?;
            if store.run(&run_id)?.is_some() {
                return Err(BiGanErr::DuplicateRun(run_id).into());
            }
            Some(store)
        }
        None => None,
    };

    Ok(Checked {
        run_id,
        config,
        log_dir,
        store,
    })
}

/// Trains a run, stopping after the iteration in progress on ctrl-c.
///
/// # Errors
/// Fails before training on anything `preflight` refuses.
pub async fn train(args: TrainArgs) -> io::Result<Outcome> {
    let Checked {
        run_id,
        config,
        log_dir,
        store,
    } = preflight(&args)?;

    let (matrix, sources) = CellMatrix::load(&args.matrix)?;
    let recorder = match store {
        Some(store) => {
            let mut recorder =
                EncodingRecorder::new(store, run_id.clone(), matrix.cells().to_vec(), sources);
            recorder.store_encoding_run()?;
            Some(recorder)
        }
        None => None,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let session = Session {
        run_id,
        config,
        iterations: args.iterations,
        matrix,
        log_dir,
        recorder,
        stop: Arc::clone(&stop),
    };

    let mut handle = task::spawn_blocking(move || session.run());

    tokio::select! {
        ret = &mut handle => {
            let completed = ret.map_err(io::Error::other)??;
            info!("training finished after {completed} iterations");
            Ok(Outcome::Finished)
        }
        _ = signal::ctrl_c() => {
            info!("received SIGINT, stopping after the current iteration");
            stop.store(true, Ordering::SeqCst);
            let completed = handle.await.map_err(io::Error::other)??;
            warn!("training interrupted after {completed} iterations");
            Ok(Outcome::Interrupted)
        }
    }
}

impl Session {
    fn run(self) -> bigan::Result<usize> {
        let Session {
            run_id,
            config,
            iterations,
            matrix,
            log_dir,
            recorder,
            stop,
        } = self;

        let mut rng = generate_rng(config.seed);
        let triad = NeuralTriad::new(&config.triad_config(matrix.ncols()), &mut rng)?;
        let trainer = AdversarialTrainer::new(
            triad,
            config.regime,
            config.labels,
            StdRng::from_rng(&mut rng),
        );
        let mut training = CellTraining::new(matrix, trainer, config.batch_size, Some(rng.random()))
            .with_batches_per_iteration(config.batches_per_iteration)
            .with_stop_flag(stop);

        let sink = Rc::new(RefCell::new(DataSink::new(
            &log_dir,
            config.sink_batch_size,
        )?));

        let print = PrintLosses::new(run_id.as_str());
        let accuracy = SaveAccuracy::new(
            Rc::clone(&sink),
            config.batch_size.get(),
            StdRng::from_rng(&mut rng),
        )?;

        let mut interceptors = combine([
            Box::new(offset(config.log_offset, skip(config.log_every, print)))
                as Box<dyn Interceptor>,
            Box::new(SaveLosses::new(Rc::clone(&sink))?),
            Box::new(skip(config.accuracy_every, accuracy)),
        ]);

        if let Some(every) = config.snapshot_every {
            let save = SaveEncodings::new(log_dir.join(SNAPSHOT_DIR))?;
            interceptors.push(Box::new(skip(every, save)));
        }

        if let Some(recorder) = recorder {
            let every: NonZeroUsize = config.snapshot_every.unwrap_or(config.accuracy_every);
            interceptors.push(Box::new(skip(every, RecordEncodings::new(recorder))));
        }

        info!(
            run_id = run_id.as_str(),
            interceptors = interceptors.len();
            "starting training, logging to {}",
            log_dir.display()
        );

        let ret = training.run(iterations, Some(&mut interceptors));
        let drained = sink.borrow_mut().drain();
        let completed = ret?;
        drained?;
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;

    fn write_matrix(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("matrix.mtx"), "3 2 1\n1 1 4\n").unwrap();
        fs::write(dir.join("genes.tsv"), "G1\tA\nG2\tB\nG3\tC\n").unwrap();
        fs::write(dir.join("barcodes.tsv"), "AAAC-1\nAAAG-1\n").unwrap();
    }

    fn args(root: &Path) -> TrainArgs {
        TrainArgs {
            matrix: root.join("matrix"),
            run_id: Some("run".to_string()),
            iterations: 1,
            config: None,
            log_root: root.join("logs"),
            store: None,
            seed: Some(1),
            batch_size: None,
            encoding_size: None,
            regime: None,
        }
    }

    #[test]
    fn fresh_runs_pass() {
        let root = tempfile::tempdir().unwrap();
        write_matrix(&root.path().join("matrix"));
        let mut args = args(root.path());
        args.store = Some(root.path().join("store"));

        let checked = preflight(&args).unwrap();

        assert_eq!(checked.run_id, "run");
        assert_eq!(checked.log_dir, root.path().join("logs").join("run"));
        assert!(checked.store.is_some());
    }

    #[test]
    fn missing_matrix_files_are_refused() {
        let root = tempfile::tempdir().unwrap();
        write_matrix(&root.path().join("matrix"));
        fs::remove_file(root.path().join("matrix").join("barcodes.tsv")).unwrap();

        let err = preflight(&args(root.path())).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn existing_log_directories_are_refused() {
        let root = tempfile::tempdir().unwrap();
        write_matrix(&root.path().join("matrix"));
        fs::create_dir_all(root.path().join("logs").join("run")).unwrap();

        let err = preflight(&args(root.path())).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn runs_already_in_the_store_are_refused() {
        let root = tempfile::tempdir().unwrap();
        write_matrix(&root.path().join("matrix"));
        let sources = Sources::locate(root.path().join("matrix")).unwrap();
        let store = JsonDirStore::open(root.path().join("store")).unwrap();
        EncodingRecorder::new(store, "run", vec![], sources)
            .store_encoding_run()
            .unwrap();

        let mut args = args(root.path());
        args.store = Some(root.path().join("store"));

        let err = preflight(&args).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(!root.path().join("logs").join("run").exists());
    }
}
