use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use machine_learning::MlErr;

use crate::triad::Role;

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, BiGanErr>;

/// Every way loading, training or recording a run can fail.
///
/// None of these are recovered from, they are meant to end the run with a diagnostic.
#[derive(Debug)]
pub enum BiGanErr {
    /// Malformed or out of range input at load time.
    Format {
        what: String,
        reason: String,
    },
    InsufficientData {
        requested: usize,
        available: usize,
    },
    Arity {
        graph: String,
        got: usize,
        expected: usize,
    },
    UnknownGraph(String),
    DuplicateGraph(String),
    /// An existing run id or log directory.
    DuplicateRun(String),
    DuplicateIteration {
        run_id: String,
        iteration: usize,
    },
    /// A 1-based cell id the store already holds.
    DuplicateCell(usize),
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A component was trained without holding its unfreeze token.
    FrozenComponent {
        role: Role,
        unfrozen: Role,
    },
    MissingFile(PathBuf),
    InvalidConfig(String),
    Io(io::Error),
    Json(serde_json::Error),
    Ml(MlErr),
}

impl BiGanErr {
    pub(crate) fn format(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl Display for BiGanErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiGanErr::Format { what, reason } => write!(f, "format error in {what}: {reason}"),
            BiGanErr::InsufficientData {
                requested,
                available,
            } => write!(
                f,
                "insufficient data: requested a batch of {requested} but there are only {available} cells"
            ),
            BiGanErr::Arity {
                graph,
                got,
                expected,
            } => write!(
                f,
                "arity error in graph {graph}: got {got} values, the header declares {expected}"
            ),
            BiGanErr::UnknownGraph(graph) => write!(f, "graph {graph} has no header"),
            BiGanErr::DuplicateGraph(graph) => write!(f, "graph {graph} already has a header"),
            BiGanErr::DuplicateRun(id) => write!(f, "encoding run already exists: {id}"),
            BiGanErr::DuplicateIteration { run_id, iteration } => {
                write!(f, "duplicate iteration {iteration} in run {run_id}")
            }
            BiGanErr::DuplicateCell(id) => write!(f, "cell {id} is already stored"),
            BiGanErr::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} mismatch: {got} != {expected}"),
            BiGanErr::FrozenComponent { role, unfrozen } => write!(
                f,
                "tried to train the {role} while the {unfrozen} is the unfrozen component"
            ),
            BiGanErr::MissingFile(path) => write!(f, "file not found: {}", path.display()),
            BiGanErr::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            BiGanErr::Io(e) => write!(f, "io error: {e}"),
            BiGanErr::Json(e) => write!(f, "json error: {e}"),
            BiGanErr::Ml(e) => write!(f, "network error: {e}"),
        }
    }
}

impl Error for BiGanErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BiGanErr::Io(e) => Some(e),
            BiGanErr::Json(e) => Some(e),
            BiGanErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BiGanErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for BiGanErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for BiGanErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<BiGanErr> for io::Error {
    fn from(value: BiGanErr) -> Self {
        match value {
            BiGanErr::Io(e) => e,
            e @ BiGanErr::MissingFile(_) => io::Error::new(io::ErrorKind::NotFound, e),
            e @ (BiGanErr::DuplicateRun(_) | BiGanErr::DuplicateCell(_)) => {
                io::Error::new(io::ErrorKind::AlreadyExists, e)
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
