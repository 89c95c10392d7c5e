use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{Interceptor, Iteration};
use crate::{BiGanErr, Result};

/// The encodings of every cell at some iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub iteration: usize,
    pub encodings: Vec<Vec<f32>>,
}

impl Snapshot {
    pub fn new(iteration: usize, encodings: ArrayView2<f32>) -> Self {
        Self {
            iteration,
            encodings: encodings.rows().into_iter().map(|r| r.to_vec()).collect(),
        }
    }

    /// The file the snapshot of `iteration` is stored in under `dir`.
    pub fn path(dir: &Path, iteration: usize) -> PathBuf {
        dir.join(format!("{iteration}.json"))
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let file = File::create(Self::path(dir, self.iteration))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Every snapshot under `dir`, sorted by iteration.
    pub fn read_dir(dir: &Path) -> Result<Vec<Self>> {
        if !dir.is_dir() {
            return Err(BiGanErr::MissingFile(dir.to_path_buf()));
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                snapshots.push(Self::read(&path)?);
            }
        }

        snapshots.sort_by_key(|s| s.iteration);
        Ok(snapshots)
    }

    /// The encodings as a cells × width matrix.
    pub fn to_array(&self) -> Result<Array2<f32>> {
        let rows = self.encodings.len();
        let width = self.encodings.first().map_or(0, Vec::len);

        if let Some(row) = self.encodings.iter().find(|r| r.len() != width) {
            return Err(BiGanErr::DimensionMismatch {
                what: "snapshot row width",
                got: row.len(),
                expected: width,
            });
        }

        let flat = self.encodings.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows, width), flat).map_err(|_| BiGanErr::DimensionMismatch {
            what: "snapshot size",
            got: rows * width,
            expected: rows * width,
        })
    }
}

/// Saves the encodings of all the cells at every iteration it sees, for offline processing.
pub struct SaveEncodings {
    dir: PathBuf,
}

impl SaveEncodings {
    /// Creates a new `SaveEncodings` writing under `dir`, which is created if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl Interceptor for SaveEncodings {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        let view = iteration.view;
        let encodings = view.encode(view.matrix().values())?;
        Snapshot::new(iteration.it, encodings.view()).write(&self.dir)
    }
}
