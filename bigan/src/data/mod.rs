mod loader;
mod matrix;
mod sampling;

pub use loader::Sources;
pub use matrix::{CellMatrix, Gene, Triple};
pub use sampling::{Batch, CellSampler};
