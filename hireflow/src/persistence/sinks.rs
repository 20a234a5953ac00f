//! Warehouse sink contract and the local sinks.

use crate::errors::{RowError, SinkError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A destination that accepts JSON rows for a logical table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Inserts `rows` into `table`.
    ///
    /// Returns the per-row errors; an empty list means every row was accepted.
    async fn insert_rows(
        &self,
        table: &str,
        rows: &[serde_json::Value],
    ) -> Result<Vec<RowError>, SinkError>;
}

#[derive(Debug, Clone)]
enum Behavior {
    Accept,
    Reject(Vec<RowError>),
    Unavailable(String),
}

/// Sink that keeps rows in memory.
///
/// It can be told to reject every batch or to fail as unreachable.
#[derive(Debug)]
pub struct InMemorySink {
    rows: Mutex<Vec<(String, serde_json::Value)>>,
    behavior: Behavior,
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            behavior: Behavior::Accept,
        }
    }
}

impl InMemorySink {
    /// Creates a sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that answers every batch with `errors`.
    #[must_use]
    pub fn rejecting(errors: Vec<RowError>) -> Self {
        Self {
            behavior: Behavior::Reject(errors),
            ..Self::default()
        }
    }

    /// Creates a sink whose every call fails at the transport level.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Unavailable(reason.into()),
            ..Self::default()
        }
    }

    /// Returns every accepted row with its table.
    #[must_use]
    pub fn rows(&self) -> Vec<(String, serde_json::Value)> {
        self.rows.lock().clone()
    }

    /// Returns the accepted rows for one table.
    #[must_use]
    pub fn rows_for(&self, table: &str) -> Vec<serde_json::Value> {
        self.rows
            .lock()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Returns the number of accepted rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Returns true if no row was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl WarehouseSink for InMemorySink {
    async fn insert_rows(
        &self,
        table: &str,
        rows: &[serde_json::Value],
    ) -> Result<Vec<RowError>, SinkError> {
        match &self.behavior {
            Behavior::Accept => {
                self.rows
                    .lock()
                    .extend(rows.iter().map(|row| (table.to_string(), row.clone())));
                Ok(Vec::new())
            }
            Behavior::Reject(errors) => Ok(errors.clone()),
            Behavior::Unavailable(reason) => Err(SinkError::Transport(reason.clone())),
        }
    }
}

/// Sink that writes each batch to a timestamped JSON file in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Creates a sink writing into `dir`. The directory is created on demand.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(table: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}.json",
            table.replace(['/', '\\'], "_"),
            Utc::now().format("%Y%m%d_%H%M%S"),
            &id[..8]
        )
    }
}

#[async_trait]
impl WarehouseSink for JsonFileSink {
    async fn insert_rows(
        &self,
        table: &str,
        rows: &[serde_json::Value],
    ) -> Result<Vec<RowError>, SinkError> {
        let errors: Vec<RowError> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_object())
            .map(|(index, _)| RowError::new(index, "invalid", "row is not a JSON object"))
            .collect();
        if !errors.is_empty() {
            return Ok(errors);
        }

        let body = serde_json::to_vec_pretty(rows)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(table));
        tokio::fs::write(&path, body).await?;

        debug!(table, path = %path.display(), rows = rows.len(), "rows written to file");
        Ok(Vec::new())
    }
}
