use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};

use super::{CellMatrix, Gene, Triple};
use crate::{BiGanErr, Result};

const MATRIX_FILE: &str = "matrix.mtx";
const GENES_FILE: &str = "genes.tsv";
const BARCODES_FILE: &str = "barcodes.tsv";
const PRESIZE_CAP: usize = 1 << 20;

/// The files a matrix was loaded from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub matrix: PathBuf,
    pub barcodes: PathBuf,
    pub genes: PathBuf,
}

impl Sources {
    /// Resolves the three source files given either their directory or the matrix file itself,
    /// the side tables are expected next to the matrix.
    ///
    /// # Errors
    /// `MissingFile` naming the first file that doesn't exist.
    pub fn locate(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (dir, matrix) = if path.is_dir() {
            (path.to_path_buf(), path.join(MATRIX_FILE))
        } else {
            let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            (dir, path.to_path_buf())
        };

        let sources = Self {
            matrix,
            barcodes: dir.join(BARCODES_FILE),
            genes: dir.join(GENES_FILE),
        };

        for file in [&sources.matrix, &sources.barcodes, &sources.genes] {
            if !file.is_file() {
                return Err(BiGanErr::MissingFile(file.clone()));
            }
        }

        Ok(sources)
    }
}

impl CellMatrix {
    /// Loads a matrix market coordinate file together with its `genes.tsv` and `barcodes.tsv`.
    ///
    /// # Arguments
    /// * `path` - The directory holding the three files, or the path to the matrix file.
    ///
    /// # Returns
    /// The dense matrix and the files it came from.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Sources)> {
        let sources = Sources::locate(path)?;

        let genes = read_genes(&sources.genes)?;
        let barcodes = read_barcodes(&sources.barcodes)?;
        let triples = read_triples(&sources.matrix, genes.len(), barcodes.len())?;

        let matrix = Self::from_triples(genes, barcodes, triples)?;
        info!(
            "loaded {} cells x {} genes from {}",
            matrix.nrows(),
            matrix.ncols(),
            sources.matrix.display()
        );

        Ok((matrix, sources))
    }
}

/// Reads the barcode table, one barcode per line.
pub(crate) fn read_barcodes(path: &Path) -> Result<Vec<String>> {
    let mut barcodes = Vec::new();

    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        let barcode = line.trim();
        if !barcode.is_empty() {
            barcodes.push(barcode.to_string());
        }
    }

    Ok(barcodes)
}

fn read_genes(path: &Path) -> Result<Vec<Gene>> {
    let mut genes = Vec::new();

    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let id = fields.next().unwrap_or_default().trim();
        let symbol = fields.next().unwrap_or(id).trim();
        genes.push(Gene::new(id, symbol));
    }

    Ok(genes)
}

fn read_triples(path: &Path, ngenes: usize, ncells: usize) -> Result<Vec<Triple>> {
    let what = path.display().to_string();
    let mut lines = BufReader::new(File::open(path)?)
        .lines()
        .enumerate()
        .filter(|(_, line)| !matches!(line, Ok(l) if l.starts_with('%') || l.trim().is_empty()));

    let Some((_, header)) = lines.next() else {
        return Err(BiGanErr::format(what, "missing size line"));
    };
    let [rows, cols, entries] = parse_fields(&what, 1, &header?)?;

    if rows != ngenes || cols != ncells {
        return Err(BiGanErr::format(
            what,
            format!("size line declares {rows} genes x {cols} cells, side tables have {ngenes} x {ncells}"),
        ));
    }

    // The size line is untrusted until the entries are counted.
    let capacity = entries.min(ngenes.saturating_mul(ncells)).min(PRESIZE_CAP);
    let mut triples = Vec::with_capacity(capacity);
    for (i, line) in lines {
        let [gene, cell, count] = parse_fields(&what, i + 1, &line?)?;
        let count = u32::try_from(count)
            .map_err(|_| BiGanErr::format(&what, format!("line {}: count {count} overflows", i + 1)))?;
        triples.push(Triple::new(gene, cell, count));
    }

    if triples.len() != entries {
        return Err(BiGanErr::format(
            what,
            format!("size line declares {entries} entries, found {}", triples.len()),
        ));
    }

    Ok(triples)
}

fn parse_fields(what: &str, lineno: usize, line: &str) -> Result<[usize; 3]> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [a, b, c] = fields[..] else {
        return Err(BiGanErr::format(
            what,
            format!("line {lineno}: expected 3 fields, found {}", fields.len()),
        ));
    };

    let parse = |field: &str| {
        field.parse::<usize>().map_err(|_| {
            BiGanErr::format(what, format!("line {lineno}: {field} is not a non negative integer"))
        })
    };

    Ok([parse(a)?, parse(b)?, parse(c)?])
}
