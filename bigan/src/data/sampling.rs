use ndarray::Array2;
use rand::{Rng, seq::index};

use super::CellMatrix;
use crate::{BiGanErr, Result, config::generate_rng};

/// A set of rows drawn from a `CellMatrix`.
#[derive(Clone, Debug)]
pub struct Batch {
    /// The 0-based rows of the matrix, in draw order.
    pub indices: Vec<usize>,
    /// A copy of those rows.
    pub cells: Array2<f32>,
}

/// Draws batches of distinct rows out of a matrix.
#[derive(Clone, Copy, Debug)]
pub struct CellSampler<'a> {
    matrix: &'a CellMatrix,
}

impl<'a> CellSampler<'a> {
    pub fn new(matrix: &'a CellMatrix) -> Self {
        Self { matrix }
    }

    /// Draws a batch with a generator of its own.
    ///
    /// # Arguments
    /// * `batch_size` - The amount of rows.
    /// * `seed` - If given, the same seed always yields the same rows in the same order.
    ///
    /// # Errors
    /// `InsufficientData` if the matrix has less than `batch_size` rows.
    pub fn sample(&self, batch_size: usize, seed: Option<u64>) -> Result<Batch> {
        self.sample_with(batch_size, &mut generate_rng(seed))
    }

    /// Draws a batch out of a caller owned generator, so consecutive calls differ.
    ///
    /// # Arguments
    /// * `batch_size` - The amount of rows.
    /// * `rng` - The random number generator.
    ///
    /// # Errors
    /// `InsufficientData` if the matrix has less than `batch_size` rows.
    pub fn sample_with<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        let available = self.matrix.nrows();
        if batch_size > available {
            return Err(BiGanErr::InsufficientData {
                requested: batch_size,
                available,
            });
        }

        let indices = index::sample(rng, available, batch_size).into_vec();
        let cells = self.matrix.rows(&indices);
        Ok(Batch { indices, cells })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::data::{Gene, Triple};

    fn matrix(ncells: usize) -> CellMatrix {
        let genes = vec![Gene::new("ENSG1", "A")];
        let cells = (0..ncells).map(|i| format!("C{i}")).collect();
        let triples = (1..=ncells).map(|c| Triple::new(1, c, c as u32));

        CellMatrix::from_triples(genes, cells, triples).unwrap()
    }

    #[test]
    fn same_seed_same_rows_in_the_same_order() {
        let matrix = matrix(50);
        let sampler = CellSampler::new(&matrix);

        let a = sampler.sample(10, Some(42)).unwrap();
        let b = sampler.sample(10, Some(42)).unwrap();

        assert_eq!(a.indices, b.indices);
        assert_eq!(a.cells, b.cells);
    }

    #[test]
    fn different_seeds_differ() {
        let matrix = matrix(50);
        let sampler = CellSampler::new(&matrix);

        let a = sampler.sample(10, Some(1)).unwrap();
        let b = sampler.sample(10, Some(2)).unwrap();

        assert_ne!(a.indices, b.indices);
    }

    #[test]
    fn rows_within_a_batch_are_distinct() {
        let matrix = matrix(20);
        let batch = CellSampler::new(&matrix).sample(20, Some(0)).unwrap();

        let unique: HashSet<_> = batch.indices.iter().collect();
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn cells_are_the_sampled_rows() {
        let matrix = matrix(20);
        let batch = CellSampler::new(&matrix).sample(5, Some(9)).unwrap();

        for (row, &i) in batch.cells.rows().into_iter().zip(&batch.indices) {
            assert_eq!(row[0], (i + 1) as f32);
        }
    }

    #[test]
    fn oversized_batch_is_insufficient_data() {
        let matrix = matrix(5);
        let err = CellSampler::new(&matrix).sample(6, None);

        assert!(matches!(
            err,
            Err(BiGanErr::InsufficientData {
                requested: 6,
                available: 5
            })
        ));
    }

    #[test]
    fn matrix_is_untouched() {
        let matrix = matrix(10);
        let before = matrix.values().to_owned();

        CellSampler::new(&matrix).sample(10, Some(3)).unwrap();
        assert_eq!(matrix.values(), before);
    }
}
