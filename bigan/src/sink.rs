use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{BiGanErr, Result};

struct Graph {
    arity: usize,
    pending: Vec<String>,
}

/// Append only CSV files, one per graph, with a header row.
///
/// Rows are buffered per graph and appended to `<log_dir>/<graph>.csv` once `batch_size` of them
/// are pending, or on `drain`.
pub struct DataSink {
    log_dir: PathBuf,
    batch_size: NonZeroUsize,
    graphs: HashMap<String, Graph>,
}

impl DataSink {
    /// Creates a new `DataSink`, creating `log_dir` if needed.
    ///
    /// # Arguments
    /// * `log_dir` - Where the CSV files go.
    /// * `batch_size` - The amount of rows a graph buffers before writing them.
    pub fn new(log_dir: impl Into<PathBuf>, batch_size: NonZeroUsize) -> Result<Self> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir)?;

        Ok(Self {
            log_dir,
            batch_size,
            graphs: HashMap::new(),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// The file a graph is written to.
    pub fn path(&self, graph_id: &str) -> PathBuf {
        self.log_dir.join(format!("{graph_id}.csv"))
    }

    /// Declares a graph and writes its header row.
    ///
    /// # Errors
    /// `DuplicateGraph` if the graph was already declared.
    pub fn add_graph_header(&mut self, graph_id: &str, fields: &[&str]) -> Result<()> {
        if self.graphs.contains_key(graph_id) {
            return Err(BiGanErr::DuplicateGraph(graph_id.to_string()));
        }

        self.append(graph_id, &[fields.join(",")])?;
        self.graphs.insert(
            graph_id.to_string(),
            Graph {
                arity: fields.len(),
                pending: Vec::new(),
            },
        );

        Ok(())
    }

    /// Queues a row of a graph.
    ///
    /// # Errors
    /// `UnknownGraph` if the graph has no header, `Arity` if `values` doesn't have as many
    /// elements as the header.
    pub fn add_data(&mut self, graph_id: &str, values: &[f64]) -> Result<()> {
        let batch_size = self.batch_size.get();
        let graph = self
            .graphs
            .get_mut(graph_id)
            .ok_or_else(|| BiGanErr::UnknownGraph(graph_id.to_string()))?;

        if values.len() != graph.arity {
            return Err(BiGanErr::Arity {
                graph: graph_id.to_string(),
                got: values.len(),
                expected: graph.arity,
            });
        }

        let row: Vec<String> = values.iter().map(f64::to_string).collect();
        graph.pending.push(row.join(","));

        if graph.pending.len() >= batch_size {
            let rows = std::mem::take(&mut graph.pending);
            self.append(graph_id, &rows)?;
        }

        Ok(())
    }

    /// Writes every pending row.
    pub fn drain(&mut self) -> Result<()> {
        let mut ids: Vec<String> = self.graphs.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let rows = match self.graphs.get_mut(&id) {
                Some(graph) if !graph.pending.is_empty() => std::mem::take(&mut graph.pending),
                _ => continue,
            };
            self.append(&id, &rows)?;
        }

        Ok(())
    }

    fn append(&self, graph_id: &str, rows: &[String]) -> Result<()> {
        let path = self.path(graph_id);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut buf = rows.join("\n");
        buf.push('\n');
        file.write_all(buf.as_bytes())?;

        debug!("appended {} rows to {}", rows.len(), path.display());
        Ok(())
    }
}
