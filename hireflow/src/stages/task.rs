//! Task stages: one external collaborator call producing one named output.

use super::StageId;
use crate::context::{ContextKey, RunContext};
use crate::errors::{ExecutorError, StageError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// An external collaborator that turns named inputs into one JSON result.
///
/// Implementations must treat an absent input as "skip this input" unless
/// they genuinely cannot proceed without it.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Names of the tool collaborators this executor uses, for diagnostics.
    fn tools(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Executes the task.
    async fn execute(&self, inputs: &TaskInputs) -> Result<serde_json::Value, ExecutorError>;
}

/// The required-input values gathered for one task execution.
///
/// Only present (non-null) values are included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInputs {
    values: BTreeMap<ContextKey, serde_json::Value>,
}

impl TaskInputs {
    /// Creates inputs from explicit values.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = (ContextKey, serde_json::Value)>) -> Self {
        Self {
            values: values.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        }
    }

    /// Reads `keys` from the context, skipping absent ones.
    #[must_use]
    pub fn gather(ctx: &RunContext, keys: &[ContextKey]) -> Self {
        Self {
            values: keys
                .iter()
                .filter_map(|key| ctx.get(*key).map(|value| (*key, value)))
                .collect(),
        }
    }

    /// Gets an input value.
    #[must_use]
    pub fn get(&self, key: ContextKey) -> Option<&serde_json::Value> {
        self.values.get(&key)
    }

    /// Gets an input that must be a string.
    #[must_use]
    pub fn get_str(&self, key: ContextKey) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }

    /// Gets an input the executor cannot work without.
    pub fn require(&self, key: ContextKey) -> Result<&serde_json::Value, ExecutorError> {
        self.get(key).ok_or(ExecutorError::MissingInput(key))
    }

    /// Returns true if a value is present.
    #[must_use]
    pub fn is_present(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Returns the present keys.
    #[must_use]
    pub fn keys(&self) -> Vec<ContextKey> {
        self.values.keys().copied().collect()
    }

    /// Iterates over present values.
    pub fn iter(&self) -> impl Iterator<Item = (ContextKey, &serde_json::Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

/// A stage that invokes one executor and stores its result under `output`.
#[derive(Clone)]
pub struct TaskStage {
    id: StageId,
    required_inputs: Vec<ContextKey>,
    output: ContextKey,
    executor: Arc<dyn TaskExecutor>,
}

impl TaskStage {
    /// Creates a task stage with no required inputs.
    pub fn new(id: impl Into<StageId>, output: ContextKey, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            id: id.into(),
            required_inputs: Vec::new(),
            output,
            executor,
        }
    }

    /// Adds a required input.
    #[must_use]
    pub fn with_input(mut self, key: ContextKey) -> Self {
        if !self.required_inputs.contains(&key) {
            self.required_inputs.push(key);
        }
        self
    }

    /// Adds several required inputs.
    #[must_use]
    pub fn with_inputs(self, keys: impl IntoIterator<Item = ContextKey>) -> Self {
        keys.into_iter().fold(self, Self::with_input)
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &StageId {
        &self.id
    }

    /// Returns the declared inputs.
    #[must_use]
    pub fn required_inputs(&self) -> &[ContextKey] {
        &self.required_inputs
    }

    /// Returns the produced output name.
    #[must_use]
    pub fn output(&self) -> ContextKey {
        self.output
    }

    /// Runs the executor and writes its result on success.
    ///
    /// A failed execution writes nothing.
    pub async fn run(&self, ctx: &RunContext) -> Result<(), StageError> {
        let inputs = TaskInputs::gather(ctx, &self.required_inputs);
        let present: Vec<&str> = inputs.keys().into_iter().map(ContextKey::as_str).collect();

        ctx.try_emit_event(
            "stage.started",
            serde_json::json!({
                "stage": self.id.as_str(),
                "output": self.output.as_str(),
                "inputs": present,
                "tools": self.executor.tools(),
            }),
        );

        let start = Instant::now();
        let result = self.executor.execute(&inputs).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(value) => {
                ctx.set(self.output, value, self.id.as_str());
                info!(
                    run_id = %ctx.identity().run_id,
                    stage = %self.id,
                    output = %self.output,
                    duration_ms,
                    "stage completed"
                );
                ctx.try_emit_event(
                    "stage.completed",
                    serde_json::json!({
                        "stage": self.id.as_str(),
                        "output": self.output.as_str(),
                        "duration_ms": duration_ms,
                    }),
                );
                Ok(())
            }
            Err(source) => {
                warn!(
                    run_id = %ctx.identity().run_id,
                    stage = %self.id,
                    error = %source,
                    duration_ms,
                    "stage failed"
                );
                ctx.try_emit_event(
                    "stage.failed",
                    serde_json::json!({
                        "stage": self.id.as_str(),
                        "error": source.to_string(),
                        "duration_ms": duration_ms,
                    }),
                );
                Err(StageError::new(self.id.as_str(), source))
            }
        }
    }
}

impl Debug for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStage")
            .field("id", &self.id)
            .field("required_inputs", &self.required_inputs)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
