//! Scripted collaborators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::collaborators::{ModelClient, ModelRequest, TextExtractor};
use crate::errors::{ExecutorError, ExtractionError};
use crate::stages::{TaskExecutor, TaskInputs};

/// A task executor that returns a fixed result and records its inputs.
#[derive(Debug)]
pub struct ScriptedExecutor {
    result: Result<serde_json::Value, ExecutorError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<TaskInputs>>,
}

impl ScriptedExecutor {
    /// Creates an executor that succeeds with `value`.
    #[must_use]
    pub fn ok(value: serde_json::Value) -> Self {
        Self::with_result(Ok(value))
    }

    /// Creates an executor that fails with `error`.
    #[must_use]
    pub fn failing(error: ExecutorError) -> Self {
        Self::with_result(Err(error))
    }

    /// Creates an executor that reports an unavailable collaborator.
    #[must_use]
    pub fn unavailable(reason: &str) -> Self {
        Self::failing(ExecutorError::Unavailable(reason.to_string()))
    }

    /// Creates an executor that reports non-JSON output.
    #[must_use]
    pub fn malformed(output: &str) -> Self {
        Self::failing(ExecutorError::MalformedOutput(output.to_string()))
    }

    fn with_result(result: Result<serde_json::Value, ExecutorError>) -> Self {
        Self {
            result,
            delay: None,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the inputs seen by each execution.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<TaskInputs> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, inputs: &TaskInputs) -> Result<serde_json::Value, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().push(inputs.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// A model client that answers by matching a marker against the request's
/// task name or system prompt.
///
/// Unmatched requests fail as an unavailable collaborator.
#[derive(Debug, Default)]
pub struct CannedModelClient {
    responses: Vec<(String, String)>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl CannedModelClient {
    /// Creates a client with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests matching `marker` with `response`.
    #[must_use]
    pub fn respond(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((marker.into(), response.into()));
        self
    }

    /// Answers with the JSON rendering of `value`.
    #[must_use]
    pub fn respond_json(self, marker: impl Into<String>, value: &serde_json::Value) -> Self {
        self.respond(marker, value.to_string())
    }

    /// Returns every request received.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelClient for CannedModelClient {
    fn model_name(&self) -> String {
        "canned".to_string()
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, ExecutorError> {
        self.requests.lock().push(request.clone());
        self.responses
            .iter()
            .find(|(marker, _)| {
                request.task == *marker || request.system.contains(marker.as_str())
            })
            .map(|(_, response)| response.clone())
            .ok_or_else(|| ExecutorError::Unavailable("no canned response".to_string()))
    }
}

/// An extractor returning fixed text, or a fixed error.
#[derive(Debug, Clone)]
pub struct StaticExtractor {
    result: Result<String, ExtractionError>,
}

impl StaticExtractor {
    /// Always returns `text`.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            result: Ok(text.into()),
        }
    }

    /// Always fails with `error`.
    #[must_use]
    pub fn failing(error: ExtractionError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract(&self, _path: &str) -> Result<String, ExtractionError> {
        self.result.clone()
    }
}
