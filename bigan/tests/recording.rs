use std::{cell::RefCell, fs, num::NonZeroUsize, rc::Rc};

use bigan::{
    AdversarialTrainer, BiGanErr, CellMatrix, CellTraining, NeuralTriad, Regime, Sources,
    TargetLabels, TriadConfig,
    config::{LossFnSpec, OptimizerSpec, generate_rng},
    intercept::{
        Interceptor, LOSSES_GRAPH, PrintLosses, SaveAccuracy, SaveEncodings, SaveLosses, Snapshot,
        combine, skip,
    },
    record::{DocumentStore, EncodingRecorder, JsonDirStore, RecordEncodings, build_iteration},
    sink::DataSink,
};
use ndarray::Array2;

const MATRIX: &str = "%%MatrixMarket matrix coordinate integer general
4 5 7
1 1 3
2 2 1
3 3 5
4 4 2
1 5 1
2 5 1
4 1 7
";

fn load(dir: &std::path::Path) -> (CellMatrix, Sources) {
    fs::write(dir.join("matrix.mtx"), MATRIX).unwrap();
    fs::write(dir.join("genes.tsv"), "G1\tA\nG2\tB\nG3\tC\nG4\tD\n").unwrap();
    fs::write(dir.join("barcodes.tsv"), "C1-1\nC2-1\nC3-1\nC4-1\nC5-1\n").unwrap();

    CellMatrix::load(dir).unwrap()
}

fn training(matrix: CellMatrix) -> CellTraining<NeuralTriad, Regime> {
    let config = TriadConfig {
        encoding_size: 3,
        gene_size: matrix.ncols(),
        generator_hidden: vec![6],
        encoder_hidden: vec![6],
        discriminator_hidden: vec![6],
        optimizer: OptimizerSpec::GradientDescent {
            learning_rate: 0.01,
        },
        loss: LossFnSpec::BinaryCrossEntropy,
    };

    let mut rng = generate_rng(Some(0));
    let triad = NeuralTriad::new(&config, &mut rng).unwrap();
    let trainer = AdversarialTrainer::new(triad, Regime::Continuous, TargetLabels::default(), rng);
    CellTraining::new(matrix, trainer, NonZeroUsize::new(2).unwrap(), Some(0))
}

#[test]
fn full_interceptor_chain_persists_every_artifact() {
    let data = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let (matrix, sources) = load(data.path());

    let store = JsonDirStore::open(logs.path().join("store")).unwrap();
    let mut recorder = EncodingRecorder::new(store, "run-1", matrix.cells().to_vec(), sources);
    recorder.store_encoding_run().unwrap();

    let sink = Rc::new(RefCell::new(
        DataSink::new(logs.path().join("run-1"), NonZeroUsize::new(4).unwrap()).unwrap(),
    ));
    let every = |n| NonZeroUsize::new(n).unwrap();

    let mut chain = combine([
        Box::new(PrintLosses::new("run-1")) as Box<dyn Interceptor>,
        Box::new(SaveLosses::new(Rc::clone(&sink)).unwrap()),
        Box::new(skip(
            every(2),
            SaveAccuracy::new(Rc::clone(&sink), 2, generate_rng(Some(1))).unwrap(),
        )),
        Box::new(skip(
            every(3),
            SaveEncodings::new(logs.path().join("encodings")).unwrap(),
        )),
        Box::new(skip(every(3), RecordEncodings::new(recorder))),
    ]);

    let mut training = training(matrix);
    assert_eq!(training.run(6, Some(&mut chain)).unwrap(), 6);
    sink.borrow_mut().drain().unwrap();

    let losses = fs::read_to_string(sink.borrow().path(LOSSES_GRAPH)).unwrap();
    let lines: Vec<&str> = losses.lines().collect();
    assert_eq!(lines[0], "iteration,total-loss,g-loss,e-loss,d-loss");
    assert_eq!(lines.len(), 7);
    assert!(lines[6].starts_with("5,"));

    let accuracy = fs::read_to_string(logs.path().join("run-1").join("accuracy.csv")).unwrap();
    let iterations: Vec<&str> = accuracy
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(iterations, ["1", "3", "5"]);

    let snapshots = Snapshot::read_dir(&logs.path().join("encodings")).unwrap();
    assert_eq!(
        snapshots.iter().map(|s| s.iteration).collect::<Vec<_>>(),
        [2, 5]
    );

    let store = JsonDirStore::open(logs.path().join("store")).unwrap();
    let run = store.run("run-1").unwrap().unwrap();
    assert_eq!(run.default_iteration, 5);

    let record = store.iteration("run-1", 2).unwrap().unwrap();
    assert_eq!(record.cell_ids, vec![1, 2, 3, 4, 5]);
    assert!(record.xs.iter().all(|x| (0.0..=255.0).contains(x)));

    let from_snapshot =
        build_iteration("run-1", &record.barcodes, 2, snapshots[0].to_array().unwrap().view())
            .unwrap();
    assert_eq!(from_snapshot, record);
}

#[test]
fn duplicate_run_is_refused_before_training() {
    let data = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let (matrix, sources) = load(data.path());

    let first = JsonDirStore::open(logs.path()).unwrap();
    EncodingRecorder::new(first, "same", matrix.cells().to_vec(), sources.clone())
        .store_encoding_run()
        .unwrap();
    let stored = JsonDirStore::open(logs.path()).unwrap().run("same").unwrap();

    let second = JsonDirStore::open(logs.path()).unwrap();
    let err = EncodingRecorder::new(second, "same", matrix.cells().to_vec(), sources)
        .store_encoding_run();

    assert!(matches!(err, Err(BiGanErr::DuplicateRun(id)) if id == "same"));
    assert_eq!(JsonDirStore::open(logs.path()).unwrap().run("same").unwrap(), stored);
}

#[test]
fn recording_from_a_wider_encoder_is_a_dimension_mismatch() {
    let data = tempfile::tempdir().unwrap();
    let (matrix, sources) = load(data.path());

    let store = JsonDirStore::open(data.path().join("store")).unwrap();
    let mut recorder = EncodingRecorder::new(store, "wide", matrix.cells().to_vec(), sources);
    recorder.store_encoding_run().unwrap();

    let err = recorder.record(0, Array2::from_elem((5, 4), 0.1).view());
    assert!(matches!(err, Err(BiGanErr::DimensionMismatch { .. })));
}
