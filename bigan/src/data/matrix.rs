use std::collections::HashSet;

use log::info;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{BiGanErr, Result};

/// A row of the gene side table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub id: String,
    pub symbol: String,
}

impl Gene {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
        }
    }
}

/// One entry of the sparse source, with 1-based indices into the gene and cell tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Triple {
    pub gene: usize,
    pub cell: usize,
    pub count: u32,
}

impl Triple {
    pub fn new(gene: usize, cell: usize, count: u32) -> Self {
        Self { gene, cell, count }
    }
}

/// A dense cells × genes table of counts.
///
/// Built once and never mutated afterwards, so it can be shared freely between readers.
#[derive(Clone, Debug)]
pub struct CellMatrix {
    cells: Vec<String>,
    genes: Vec<Gene>,
    values: Array2<f32>,
}

impl CellMatrix {
    /// Builds the dense matrix out of a sparse triple stream.
    ///
    /// # Arguments
    /// * `genes` - The ordered gene table, column `j` is gene `j + 1` of the triples.
    /// * `cells` - The ordered cell barcodes, row `i` is cell `i + 1` of the triples.
    /// * `triples` - The non zero counts.
    ///
    /// # Returns
    /// The matrix with every absent pair set to zero, or a `Format` error if an index is 0,
    /// beyond its table, or repeated.
    pub fn from_triples<I>(genes: Vec<Gene>, cells: Vec<String>, triples: I) -> Result<Self>
    where
        I: IntoIterator<Item = Triple>,
    {
        check_unique("barcodes", cells.iter())?;
        check_unique("genes", genes.iter().map(|g| &g.id))?;

        let mut values = Array2::zeros((cells.len(), genes.len()));
        let mut seen = HashSet::new();

        for Triple { gene, cell, count } in triples {
            let row = to_zero_based("cell", cell, cells.len())?;
            let col = to_zero_based("gene", gene, genes.len())?;

            if !seen.insert((row, col)) {
                return Err(BiGanErr::format(
                    "triples",
                    format!("gene {gene} of cell {cell} appears more than once"),
                ));
            }

            values[(row, col)] = count as f32;
        }

        info!(cells = cells.len(), genes = genes.len(), entries = seen.len(); "built cell matrix");
        Ok(Self {
            cells,
            genes,
            values,
        })
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Copies the given rows, in the given order.
    pub fn rows(&self, indices: &[usize]) -> Array2<f32> {
        self.values.select(Axis(0), indices)
    }
}

fn to_zero_based(what: &str, index: usize, len: usize) -> Result<usize> {
    if index == 0 || index > len {
        return Err(BiGanErr::format(
            "triples",
            format!("{what} index {index} is outside 1..={len}"),
        ));
    }

    Ok(index - 1)
}

fn check_unique<'a, I>(what: &str, labels: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();

    for label in labels {
        if !seen.insert(label) {
            return Err(BiGanErr::format(what, format!("{label} appears more than once")));
        }
    }

    Ok(())
}
