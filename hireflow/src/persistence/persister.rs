//! Wraps a merged record as a single-row batch and sends it to a sink.

use super::WarehouseSink;
use crate::errors::PersistError;
use crate::merge::MergedRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Table candidate records land in unless configured otherwise.
pub const DEFAULT_TABLE: &str = "candidate_cv.welder_profile_v1";

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistAck {
    /// Destination table.
    pub table: String,
    /// Rows written.
    pub rows: usize,
    /// SHA-256 of the record, for correlating logs. Not a dedup key.
    pub fingerprint: String,
    /// When the sink acknowledged the write.
    pub persisted_at: DateTime<Utc>,
}

/// Persists merged records to one table.
#[derive(Clone)]
pub struct RecordPersister {
    sink: Arc<dyn WarehouseSink>,
    table: String,
}

impl RecordPersister {
    /// Creates a persister writing to [`DEFAULT_TABLE`].
    pub fn new(sink: Arc<dyn WarehouseSink>) -> Self {
        Self {
            sink,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Sets the destination table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Returns the destination table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Sends `record` as a one-row batch. Any failure is terminal.
    pub async fn persist(&self, record: &MergedRecord) -> Result<PersistAck, PersistError> {
        let rows = [record.to_row()];
        let fingerprint = record.fingerprint();
        let start = Instant::now();

        let result = self.sink.insert_rows(&self.table, &rows).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(errors) if errors.is_empty() => {
                info!(table = %self.table, %fingerprint, duration_ms, "record persisted");
                Ok(PersistAck {
                    table: self.table.clone(),
                    rows: rows.len(),
                    fingerprint,
                    persisted_at: Utc::now(),
                })
            }
            Ok(errors) => {
                error!(
                    table = %self.table,
                    %fingerprint,
                    row_errors = errors.len(),
                    first_error = %errors[0].message,
                    "sink rejected record"
                );
                Err(PersistError::Rejected {
                    table: self.table.clone(),
                    errors,
                })
            }
            Err(source) => {
                error!(table = %self.table, %fingerprint, error = %source, duration_ms, "sink call failed");
                Err(PersistError::Sink {
                    table: self.table.clone(),
                    source,
                })
            }
        }
    }
}

impl std::fmt::Debug for RecordPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordPersister")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RowError, SinkError};
    use crate::persistence::{InMemorySink, MockWarehouseSink};
    use serde_json::json;

    fn record() -> MergedRecord {
        let mut record = MergedRecord::new();
        record.insert("name", json!("Jane"));
        record.insert("skills", json!("TIG, MIG"));
        record
    }

    #[tokio::test]
    async fn test_persist_sends_single_row_batch() {
        let mut sink = MockWarehouseSink::new();
        sink.expect_insert_rows()
            .withf(|table, rows| {
                table == DEFAULT_TABLE
                    && rows.len() == 1
                    && rows[0] == json!({"name": "Jane", "skills": "TIG, MIG"})
            })
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let ack = RecordPersister::new(Arc::new(sink)).persist(&record()).await.unwrap();

        assert_eq!(ack.table, DEFAULT_TABLE);
        assert_eq!(ack.rows, 1);
        assert_eq!(ack.fingerprint, record().fingerprint());
    }

    #[tokio::test]
    async fn test_row_errors_are_rejection() {
        let mut sink = MockWarehouseSink::new();
        sink.expect_insert_rows()
            .times(1)
            .returning(|_, _| Ok(vec![RowError::new(0, "invalid", "no such field: skills")]));

        let err = RecordPersister::new(Arc::new(sink))
            .with_table("ds.t")
            .persist(&record())
            .await
            .unwrap_err();

        match err {
            PersistError::Rejected { table, errors } => {
                assert_eq!(table, "ds.t");
                assert_eq!(errors[0].reason, "invalid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let mut sink = MockWarehouseSink::new();
        sink.expect_insert_rows()
            .times(1)
            .returning(|_, _| Err(SinkError::Transport("503".into())));

        let err = RecordPersister::new(Arc::new(sink)).persist(&record()).await.unwrap_err();

        assert!(matches!(err, PersistError::Sink { .. }));
    }

    #[tokio::test]
    async fn test_persist_into_memory_sink() {
        let sink = Arc::new(InMemorySink::new());
        let persister = RecordPersister::new(sink.clone()).with_table("local.candidates");

        persister.persist(&record()).await.unwrap();

        assert_eq!(sink.rows_for("local.candidates").len(), 1);
    }
}
