use std::collections::BTreeMap;

use chrono::Utc;
use log::info;
use ndarray::ArrayView2;

use super::{CellRecord, DocumentStore, GeneCount, IterationRecord, RunRecord};
use crate::{
    BiGanErr, CellMatrix, Result,
    data::Sources,
    intercept::{Interceptor, Iteration},
};

/// Encodings lie in the unit interval, coordinates in `[0, 255]`.
const SCALE: f32 = 255.;
const DIMENSIONS: usize = 3;

/// Builds the record of the encodings of every cell at one iteration.
///
/// # Arguments
/// * `run_id` - The run the iteration belongs to.
/// * `barcodes` - The cells, in row order of `encodings`.
/// * `iteration` - The iteration the encodings were taken at.
/// * `encodings` - One 3-dimensional encoding per cell.
///
/// # Returns
/// The record, or `DimensionMismatch` if there isn't one encoding per barcode or the encodings
/// aren't 3-dimensional.
pub fn build_iteration(
    run_id: &str,
    barcodes: &[String],
    iteration: usize,
    encodings: ArrayView2<f32>,
) -> Result<IterationRecord> {
    if encodings.nrows() != barcodes.len() {
        return Err(BiGanErr::DimensionMismatch {
            what: "encodings and barcodes length",
            got: encodings.nrows(),
            expected: barcodes.len(),
        });
    }

    if encodings.ncols() != DIMENSIONS {
        return Err(BiGanErr::DimensionMismatch {
            what: "encoding width",
            got: encodings.ncols(),
            expected: DIMENSIONS,
        });
    }

    let scaled = encodings.mapv(|v| v * SCALE);
    let column = |j: usize| scaled.column(j).to_vec();
    let (xs, ys, zs) = (column(0), column(1), column(2));
    let duplicates = duplicate_groups(&xs, &ys, &zs);

    Ok(IterationRecord {
        run_id: run_id.to_string(),
        iteration,
        cell_ids: (1..=barcodes.len()).collect(),
        barcodes: barcodes.to_vec(),
        xs,
        ys,
        zs,
        duplicates,
    })
}

/// Groups the 1-based ids of the points that round to the same integer triple.
///
/// Only groups of two or more ids are returned, ordered by their triple, each sorted
/// ascending.
pub fn duplicate_groups(xs: &[f32], ys: &[f32], zs: &[f32]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<(i64, i64, i64), Vec<usize>> = BTreeMap::new();

    for (i, ((x, y), z)) in xs.iter().zip(ys).zip(zs).enumerate() {
        let key = (x.round() as i64, y.round() as i64, z.round() as i64);
        groups.entry(key).or_default().push(i + 1);
    }

    groups.into_values().filter(|ids| ids.len() > 1).collect()
}

/// Builds one record per cell of `matrix`, with the genes it expresses sorted by descending
/// count. Ties keep the gene table order.
pub fn build_cells(matrix: &CellMatrix) -> Vec<CellRecord> {
    matrix
        .values()
        .rows()
        .into_iter()
        .zip(matrix.cells())
        .enumerate()
        .map(|(i, (row, barcode))| {
            let mut genes: Vec<GeneCount> = row
                .iter()
                .zip(matrix.genes())
                .filter(|&(&v, _)| v > 0.)
                .map(|(&v, gene)| GeneCount {
                    id: gene.id.clone(),
                    symbol: gene.symbol.clone(),
                    count: v as u32,
                })
                .collect();
            genes.sort_by(|a, b| b.count.cmp(&a.count));

            CellRecord {
                id: i + 1,
                barcode: barcode.clone(),
                genes,
            }
        })
        .collect()
}

/// Records a run's encodings into a document store.
pub struct EncodingRecorder<D> {
    store: D,
    run_id: String,
    barcodes: Vec<String>,
    sources: Sources,
}

impl<D: DocumentStore> EncodingRecorder<D> {
    /// Creates a new `EncodingRecorder`.
    ///
    /// # Arguments
    /// * `store` - Where the documents go.
    /// * `run_id` - The id of the run, unique within the store.
    /// * `barcodes` - The cells of the matrix, in row order.
    /// * `sources` - The files the matrix was loaded from.
    pub fn new(store: D, run_id: impl Into<String>, barcodes: Vec<String>, sources: Sources) -> Self {
        Self {
            store,
            run_id: run_id.into(),
            barcodes,
            sources,
        }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Creates the run document.
    ///
    /// # Errors
    /// `DuplicateRun` if the store has a run with the same id, which is left untouched.
    pub fn store_encoding_run(&mut self) -> Result<()> {
        if self.store.run(&self.run_id)?.is_some() {
            return Err(BiGanErr::DuplicateRun(self.run_id.clone()));
        }

        self.store.insert_run(RunRecord {
            id: self.run_id.clone(),
            date: Utc::now(),
            default_iteration: 0,
            shown_iterations: vec![0],
            sources: self.sources.clone(),
        })?;

        info!("stored encoding run {}", self.run_id);
        Ok(())
    }

    /// Stores the encodings of one iteration and makes it the run's default.
    ///
    /// # Errors
    /// `DimensionMismatch` on malformed encodings, `DuplicateIteration` if the iteration was
    /// already recorded.
    pub fn record(&mut self, iteration: usize, encodings: ArrayView2<f32>) -> Result<()> {
        let record = build_iteration(&self.run_id, &self.barcodes, iteration, encodings)?;
        self.insert(record)
    }

    /// Stores an already built iteration record and makes it the run's default.
    pub fn insert(&mut self, record: IterationRecord) -> Result<()> {
        if self.store.iteration(&self.run_id, record.iteration)?.is_some() {
            return Err(BiGanErr::DuplicateIteration {
                run_id: self.run_id.clone(),
                iteration: record.iteration,
            });
        }

        let iteration = record.iteration;
        self.store.insert_iteration(record)?;
        self.store.set_default_iteration(&self.run_id, iteration)
    }
}

/// Records the encodings of all cells at every iteration it sees.
pub struct RecordEncodings<D> {
    recorder: EncodingRecorder<D>,
}

impl<D: DocumentStore> RecordEncodings<D> {
    pub fn new(recorder: EncodingRecorder<D>) -> Self {
        Self { recorder }
    }

    pub fn recorder(&self) -> &EncodingRecorder<D> {
        &self.recorder
    }
}

impl<D: DocumentStore> Interceptor for RecordEncodings<D> {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        let view = iteration.view;
        let encodings = view.encode(view.matrix().values())?;
        self.recorder.record(iteration.it, encodings.view())
    }
}
