//! Persistence of encodings for visualization tools.

mod recorder;
mod store;

pub use recorder::{
    EncodingRecorder, RecordEncodings, build_cells, build_iteration, duplicate_groups,
};
pub use store::{
    CellRecord, DocumentStore, GeneCount, IterationRecord, JsonDirStore, MemoryStore, RunRecord,
};
