use bigan::{
    CellMatrix, Result,
    intercept::Snapshot,
    record::{
        DocumentStore, EncodingRecorder, IterationRecord, JsonDirStore, build_cells,
        build_iteration,
    },
};
use log::info;
use rayon::prelude::*;

use crate::cli::{CellsArgs, ImportArgs};

/// Stores every snapshot under `args.snapshots` as an iteration of the run, creating the run if
/// the store doesn't have it yet.
///
/// # Returns
/// The amount of iterations stored.
pub fn import(args: &ImportArgs) -> Result<usize> {
    let snapshots = Snapshot::read_dir(&args.snapshots)?;
    let (matrix, sources) = CellMatrix::load(&args.matrix)?;
    let barcodes = matrix.cells();

    let records = snapshots
        .par_iter()
        .map(|snapshot| {
            let encodings = snapshot.to_array()?;
            build_iteration(&args.run_id, barcodes, snapshot.iteration, encodings.view())
        })
        .collect::<Result<Vec<IterationRecord>>>()?;

    let store = JsonDirStore::open(&args.store)?;
    let mut recorder =
        EncodingRecorder::new(store, args.run_id.clone(), barcodes.to_vec(), sources);
    if recorder.store().run(&args.run_id)?.is_none() {
        recorder.store_encoding_run()?;
    }

    let n = records.len();
    for record in records {
        recorder.insert(record)?;
    }

    info!(run_id = args.run_id.as_str(), iterations = n; "imported snapshots");
    Ok(n)
}

/// Stores every cell of the matrix at `args.matrix`, so the ids of the iteration records
/// resolve to barcodes and genes.
///
/// # Returns
/// The amount of cells stored.
pub fn import_cells(args: &CellsArgs) -> Result<usize> {
    let (matrix, _) = CellMatrix::load(&args.matrix)?;
    let cells = build_cells(&matrix);
    let n = cells.len();

    let mut store = JsonDirStore::open(&args.store)?;
    store.insert_cells(cells)?;

    info!(cells = n; "imported cells");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use bigan::BiGanErr;
    use ndarray::array;

    use super::*;

    const MATRIX: &str = "%%MatrixMarket matrix coordinate integer general\n\
                          3 2 3\n\
                          1 1 4\n\
                          2 1 1\n\
                          3 2 7\n";

    fn write_matrix(dir: &Path) {
        fs::write(dir.join("matrix.mtx"), MATRIX).unwrap();
        fs::write(dir.join("genes.tsv"), "G1\tA\nG2\tB\nG3\tC\n").unwrap();
        fs::write(dir.join("barcodes.tsv"), "AAAC-1\nAAAG-1\n").unwrap();
    }

    fn args(root: &Path) -> ImportArgs {
        ImportArgs {
            store: root.join("store"),
            run_id: "run".to_string(),
            snapshots: root.join("snapshots"),
            matrix: root.join("matrix"),
        }
    }

    #[test]
    fn snapshots_become_iterations_of_the_run() {
        let root = tempfile::tempdir().unwrap();
        let args = args(root.path());
        fs::create_dir_all(&args.matrix).unwrap();
        fs::create_dir_all(&args.snapshots).unwrap();
        write_matrix(&args.matrix);

        for it in [4, 9] {
            let encodings = array![[0., 0.5, 1.], [0., 0.5, 1.]];
            Snapshot::new(it, encodings.view())
                .write(&args.snapshots)
                .unwrap();
        }

        assert_eq!(import(&args).unwrap(), 2);

        let store = JsonDirStore::open(&args.store).unwrap();
        let run = store.run("run").unwrap().unwrap();
        assert_eq!(run.default_iteration, 9);

        let record = store.iteration("run", 4).unwrap().unwrap();
        assert_eq!(record.barcodes, vec!["AAAC-1", "AAAG-1"]);
        assert_eq!(record.ys, vec![127.5, 127.5]);
        assert_eq!(record.duplicates, vec![vec![1, 2]]);
    }

    #[test]
    fn importing_twice_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let args = args(root.path());
        fs::create_dir_all(&args.matrix).unwrap();
        fs::create_dir_all(&args.snapshots).unwrap();
        write_matrix(&args.matrix);

        let encodings = array![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]];
        Snapshot::new(0, encodings.view())
            .write(&args.snapshots)
            .unwrap();

        import(&args).unwrap();
        assert!(matches!(
            import(&args),
            Err(BiGanErr::DuplicateIteration { iteration: 0, .. })
        ));
    }

    #[test]
    fn snapshots_of_another_matrix_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let args = args(root.path());
        fs::create_dir_all(&args.matrix).unwrap();
        fs::create_dir_all(&args.snapshots).unwrap();
        write_matrix(&args.matrix);

        let encodings = array![[0.1, 0.2, 0.3]];
        Snapshot::new(0, encodings.view())
            .write(&args.snapshots)
            .unwrap();

        assert!(matches!(
            import(&args),
            Err(BiGanErr::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn cells_are_stored_once() {
        let root = tempfile::tempdir().unwrap();
        let args = CellsArgs {
            store: root.path().join("store"),
            matrix: root.path().join("matrix"),
        };
        fs::create_dir_all(&args.matrix).unwrap();
        write_matrix(&args.matrix);

        assert_eq!(import_cells(&args).unwrap(), 2);

        let cells = JsonDirStore::open(&args.store).unwrap().cells().unwrap();
        assert_eq!(cells[0].barcode, "AAAC-1");
        let symbols = cells[0].genes.iter().map(|g| g.symbol.as_str()).collect::<Vec<_>>();
        assert_eq!(symbols, ["A", "B"]);
        assert_eq!(cells[1].genes[0].count, 7);

        assert!(matches!(import_cells(&args), Err(BiGanErr::DuplicateCell(1))));
    }
}
