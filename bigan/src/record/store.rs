use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{BiGanErr, Result, data::Sources};

/// An encoding run, the parent of its iteration records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    /// The iteration a viewer opens first.
    pub default_iteration: usize,
    pub shown_iterations: Vec<usize>,
    pub sources: Sources,
}

/// The encodings of every cell at one iteration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub run_id: String,
    pub iteration: usize,
    /// 1-based cell ids.
    pub cell_ids: Vec<usize>,
    pub barcodes: Vec<String>,
    pub xs: Vec<f32>,
    pub ys: Vec<f32>,
    pub zs: Vec<f32>,
    /// Groups of cell ids that land on the same rounded point.
    pub duplicates: Vec<Vec<usize>>,
}

/// The counts of one gene in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneCount {
    #[serde(rename = "e")]
    pub id: String,
    #[serde(rename = "m")]
    pub symbol: String,
    #[serde(rename = "v")]
    pub count: u32,
}

/// A cell of the matrix, as a viewer looks it up from the ids of an iteration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// 1-based, the row of the cell in the matrix plus one.
    pub id: usize,
    pub barcode: String,
    /// The genes with a non zero count, highest count first.
    pub genes: Vec<GeneCount>,
}

/// Where runs, their iterations and the cells they refer to are kept.
///
/// Stores refuse to overwrite: a run id, a `(run id, iteration)` pair and a cell id can be
/// inserted once.
pub trait DocumentStore {
    /// # Errors
    /// `DuplicateRun` if a run with the same id exists.
    fn insert_run(&mut self, run: RunRecord) -> Result<()>;

    fn run(&self, id: &str) -> Result<Option<RunRecord>>;

    /// # Errors
    /// `DuplicateIteration` if the run already has a record for that iteration.
    fn insert_iteration(&mut self, record: IterationRecord) -> Result<()>;

    fn iteration(&self, run_id: &str, iteration: usize) -> Result<Option<IterationRecord>>;

    /// Points the run's default iteration to `iteration`.
    fn set_default_iteration(&mut self, run_id: &str, iteration: usize) -> Result<()>;

    /// # Errors
    /// `DuplicateCell` if any of the ids is stored already, in which case none of `cells` is.
    fn insert_cells(&mut self, cells: Vec<CellRecord>) -> Result<()>;

    /// Every stored cell, by ascending id.
    fn cells(&self) -> Result<Vec<CellRecord>>;
}

/// A store living in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: BTreeMap<String, RunRecord>,
    iterations: BTreeMap<(String, usize), IterationRecord>,
    cells: BTreeMap<usize, CellRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn insert_run(&mut self, run: RunRecord) -> Result<()> {
        if self.runs.contains_key(&run.id) {
            return Err(BiGanErr::DuplicateRun(run.id));
        }

        self.runs.insert(run.id.clone(), run);
        Ok(())
    }

    fn run(&self, id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.get(id).cloned())
    }

    fn insert_iteration(&mut self, record: IterationRecord) -> Result<()> {
        let key = (record.run_id.clone(), record.iteration);
        if self.iterations.contains_key(&key) {
            return Err(BiGanErr::DuplicateIteration {
                run_id: key.0,
                iteration: key.1,
            });
        }

        self.iterations.insert(key, record);
        Ok(())
    }

    fn iteration(&self, run_id: &str, iteration: usize) -> Result<Option<IterationRecord>> {
        Ok(self.iterations.get(&(run_id.to_string(), iteration)).cloned())
    }

    fn set_default_iteration(&mut self, run_id: &str, iteration: usize) -> Result<()> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| BiGanErr::InvalidConfig(format!("unknown run {run_id}")))?;

        run.default_iteration = iteration;
        Ok(())
    }

    fn insert_cells(&mut self, cells: Vec<CellRecord>) -> Result<()> {
        let mut seen = BTreeSet::new();
        if let Some(cell) = cells
            .iter()
            .find(|c| self.cells.contains_key(&c.id) || !seen.insert(c.id))
        {
            return Err(BiGanErr::DuplicateCell(cell.id));
        }

        self.cells.extend(cells.into_iter().map(|c| (c.id, c)));
        Ok(())
    }

    fn cells(&self) -> Result<Vec<CellRecord>> {
        Ok(self.cells.values().cloned().collect())
    }
}

/// A store of JSON documents on disk:
///
/// ```text
/// <root>/runs/<run id>.json
/// <root>/iterations/<run id>/<iteration>.json
/// <root>/cells/<cell id>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Opens the store at `root`, creating its directories if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("runs"))?;
        fs::create_dir_all(root.join("iterations"))?;
        fs::create_dir_all(root.join("cells"))?;
        Ok(Self { root })
    }

    fn run_path(&self, id: &str) -> PathBuf {
        self.root.join("runs").join(format!("{id}.json"))
    }

    fn iteration_path(&self, run_id: &str, iteration: usize) -> PathBuf {
        self.root
            .join("iterations")
            .join(run_id)
            .join(format!("{iteration}.json"))
    }

    fn cell_path(&self, id: usize) -> PathBuf {
        self.root.join("cells").join(format!("{id}.json"))
    }
}

/// Writes `doc` to `path` unless the file exists.
///
/// # Returns
/// `false` if the file was already there.
fn create_new<T: Serialize>(path: &Path, doc: &T) -> Result<bool> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, doc)?;
    writer.flush()?;
    Ok(true)
}

/// Replaces the document at `path` by writing it aside and renaming it over the old one.
fn replace<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut writer = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer_pretty(&mut writer, doc)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_doc<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_reader(BufReader::new(file))?))
}

impl DocumentStore for JsonDirStore {
    fn insert_run(&mut self, run: RunRecord) -> Result<()> {
        if !create_new(&self.run_path(&run.id), &run)? {
            return Err(BiGanErr::DuplicateRun(run.id));
        }

        fs::create_dir_all(self.root.join("iterations").join(&run.id))?;
        Ok(())
    }

    fn run(&self, id: &str) -> Result<Option<RunRecord>> {
        read_doc(&self.run_path(id))
    }

    fn insert_iteration(&mut self, record: IterationRecord) -> Result<()> {
        let path = self.iteration_path(&record.run_id, record.iteration);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        if !create_new(&path, &record)? {
            return Err(BiGanErr::DuplicateIteration {
                run_id: record.run_id,
                iteration: record.iteration,
            });
        }

        Ok(())
    }

    fn iteration(&self, run_id: &str, iteration: usize) -> Result<Option<IterationRecord>> {
        read_doc(&self.iteration_path(run_id, iteration))
    }

    fn set_default_iteration(&mut self, run_id: &str, iteration: usize) -> Result<()> {
        let mut run = self
            .run(run_id)?
            .ok_or_else(|| BiGanErr::InvalidConfig(format!("unknown run {run_id}")))?;
        run.default_iteration = iteration;

        replace(&self.run_path(run_id), &run)
    }

    fn insert_cells(&mut self, cells: Vec<CellRecord>) -> Result<()> {
        let mut seen = BTreeSet::new();
        if let Some(cell) = cells
            .iter()
            .find(|c| self.cell_path(c.id).exists() || !seen.insert(c.id))
        {
            return Err(BiGanErr::DuplicateCell(cell.id));
        }

        for cell in &cells {
            if !create_new(&self.cell_path(cell.id), cell)? {
                return Err(BiGanErr::DuplicateCell(cell.id));
            }
        }

        Ok(())
    }

    fn cells(&self) -> Result<Vec<CellRecord>> {
        let mut cells = Vec::new();
        for entry in fs::read_dir(self.root.join("cells"))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                cells.extend(read_doc::<CellRecord>(&path)?);
            }
        }

        cells.sort_by_key(|c| c.id);
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str) -> RunRecord {
        RunRecord {
            id: id.to_string(),
            date: Utc::now(),
            default_iteration: 0,
            shown_iterations: vec![0],
            sources: Sources {
                matrix: "matrix.mtx".into(),
                barcodes: "barcodes.tsv".into(),
                genes: "genes.tsv".into(),
            },
        }
    }

    fn iteration(run_id: &str, iteration: usize) -> IterationRecord {
        IterationRecord {
            run_id: run_id.to_string(),
            iteration,
            cell_ids: vec![1],
            barcodes: vec!["A-1".into()],
            xs: vec![1.],
            ys: vec![2.],
            zs: vec![3.],
            duplicates: vec![],
        }
    }

    fn cell(id: usize) -> CellRecord {
        CellRecord {
            id,
            barcode: format!("C{id}-1"),
            genes: vec![GeneCount {
                id: "ENSG1".into(),
                symbol: "A".into(),
                count: 3,
            }],
        }
    }

    fn exercise(store: &mut dyn DocumentStore) {
        let first = run("r");
        store.insert_run(first.clone()).unwrap();

        let mut second = run("r");
        second.default_iteration = 99;
        assert!(matches!(store.insert_run(second), Err(BiGanErr::DuplicateRun(id)) if id == "r"));
        assert_eq!(store.run("r").unwrap(), Some(first));

        store.insert_iteration(iteration("r", 4)).unwrap();
        assert!(matches!(
            store.insert_iteration(iteration("r", 4)),
            Err(BiGanErr::DuplicateIteration { iteration: 4, .. })
        ));
        assert_eq!(store.iteration("r", 4).unwrap(), Some(iteration("r", 4)));
        assert_eq!(store.iteration("r", 5).unwrap(), None);

        store.set_default_iteration("r", 4).unwrap();
        assert_eq!(store.run("r").unwrap().unwrap().default_iteration, 4);
        assert!(store.set_default_iteration("missing", 1).is_err());

        store.insert_cells(vec![cell(2), cell(1)]).unwrap();
        assert!(matches!(
            store.insert_cells(vec![cell(3), cell(2)]),
            Err(BiGanErr::DuplicateCell(2))
        ));
        assert!(matches!(
            store.insert_cells(vec![cell(4), cell(4)]),
            Err(BiGanErr::DuplicateCell(4))
        ));
        assert_eq!(store.cells().unwrap(), vec![cell(1), cell(2)]);
    }

    #[test]
    fn memory_store_refuses_overwrites() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn json_store_refuses_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&mut JsonDirStore::open(dir.path()).unwrap());
    }

    #[test]
    fn json_store_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        JsonDirStore::open(dir.path()).unwrap().insert_run(run("r")).unwrap();

        let mut reopened = JsonDirStore::open(dir.path()).unwrap();
        assert!(reopened.run("r").unwrap().is_some());
        assert!(matches!(reopened.insert_run(run("r")), Err(BiGanErr::DuplicateRun(_))));
    }

    #[test]
    fn default_iteration_is_rewritten_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store.insert_run(run("r")).unwrap();

        store.set_default_iteration("r", 7).unwrap();
        store.set_default_iteration("r", 9).unwrap();

        let names = fs::read_dir(dir.path().join("runs"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect::<Vec<_>>();
        assert_eq!(names, ["r.json"]);
        assert_eq!(store.run("r").unwrap().unwrap().default_iteration, 9);
    }

    #[test]
    fn cells_are_stored_with_the_viewer_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store.insert_cells(vec![cell(1)]).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("cells/1.json")).unwrap())
                .unwrap();
        assert_eq!(doc["genes"][0]["e"], "ENSG1");
        assert_eq!(doc["genes"][0]["m"], "A");
        assert_eq!(doc["genes"][0]["v"], 3);
    }
}
