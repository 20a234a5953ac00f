//! BigQuery streaming-insert sink.

use super::WarehouseSink;
use crate::errors::{RowError, SinkError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

#[derive(Debug, Default, Deserialize)]
struct InsertAllResponse {
    #[serde(default, rename = "insertErrors")]
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    message: String,
}

/// Sink that streams rows through `tabledata.insertAll`.
///
/// Tables are addressed as `dataset.table`; a bare table name uses the
/// sink's default dataset. Rows carry no insert id, so BigQuery does not
/// deduplicate them.
#[derive(Clone)]
pub struct BigQuerySink {
    http: reqwest::Client,
    project: String,
    default_dataset: String,
    access_token: String,
    base_url: String,
}

impl BigQuerySink {
    /// Creates a sink for `project`.
    pub fn new(
        project: impl Into<String>,
        default_dataset: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            project: project.into(),
            default_dataset: default_dataset.into(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, table: &str) -> String {
        let (dataset, table) = match table.split_once('.') {
            Some((dataset, table)) => (dataset, table),
            None => (self.default_dataset.as_str(), table),
        };
        format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.base_url.trim_end_matches('/'),
            self.project,
            dataset,
            table
        )
    }
}

fn row_errors(response: InsertAllResponse) -> Vec<RowError> {
    response
        .insert_errors
        .into_iter()
        .flat_map(|insert| {
            let index = insert.index;
            if insert.errors.is_empty() {
                return vec![RowError::new(index, "unknown", "row rejected without detail")];
            }
            insert
                .errors
                .into_iter()
                .map(|e| {
                    let message = if e.location.is_empty() {
                        e.message
                    } else {
                        format!("{} ({})", e.message, e.location)
                    };
                    RowError::new(index, e.reason, message)
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl WarehouseSink for BigQuerySink {
    async fn insert_rows(
        &self,
        table: &str,
        rows: &[serde_json::Value],
    ) -> Result<Vec<RowError>, SinkError> {
        let body = serde_json::json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "rows": rows.iter().map(|row| serde_json::json!({"json": row})).collect::<Vec<_>>(),
        });

        let response = self
            .http
            .post(self.endpoint(table))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(format!("BigQuery request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SinkError::Transport(format!("BigQuery response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(SinkError::Transport(format!(
                "BigQuery insertAll failed ({status}): {text}"
            )));
        }

        let parsed: InsertAllResponse = if text.trim().is_empty() {
            InsertAllResponse::default()
        } else {
            serde_json::from_str(&text)?
        };
        let errors = row_errors(parsed);
        debug!(table, rows = rows.len(), row_errors = errors.len(), "insertAll returned");
        Ok(errors)
    }
}

impl std::fmt::Debug for BigQuerySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQuerySink")
            .field("project", &self.project)
            .field("default_dataset", &self.default_dataset)
            .finish_non_exhaustive()
    }
}
