//! Runs the workflow once per request: seed, execute, merge, persist.

use super::builder::PipelineDefinition;
use crate::context::{ContextSnapshot, RunContext, RunIdentity};
use crate::errors::{HireflowError, InputError};
use crate::events::{EventSink, NoOpEventSink};
use crate::merge::{json_type, MergeAnomaly, MergeEngine, MergedRecord};
use crate::observability::run_span;
use crate::persistence::{PersistAck, RecordPersister};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// The caller's input for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Path of the resume document.
    pub profile_path: String,
    /// Job description, as a JSON object or a string holding one.
    pub job_description: Value,
}

impl EvaluationRequest {
    /// Creates a request.
    pub fn new(profile_path: impl Into<String>, job_description: Value) -> Self {
        Self {
            profile_path: profile_path.into(),
            job_description,
        }
    }

    /// Checks the request and returns the job description as a JSON object.
    ///
    /// # Errors
    ///
    /// Fails if the path is empty or names no file, or if the job description
    /// is not (or does not encode) a JSON object.
    pub async fn validate(&self) -> Result<Value, InputError> {
        let path = self.profile_path.trim();
        if path.is_empty() {
            return Err(InputError::MissingProfilePath);
        }
        let is_file = tokio::fs::metadata(path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file {
            return Err(InputError::ProfileNotFound {
                path: path.to_string(),
            });
        }
        normalize_job_description(&self.job_description)
    }
}

fn normalize_job_description(value: &Value) -> Result<Value, InputError> {
    let invalid = |reason: String| InputError::InvalidJobDescription { reason };
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Object(_)) => Ok(parsed),
            Ok(other) => Err(invalid(format!("string decodes to {}", json_type(&other)))),
            Err(e) => Err(invalid(format!("string is not valid JSON: {e}"))),
        },
        other => Err(invalid(format!("found {}", json_type(other)))),
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Id of the run.
    pub run_id: Uuid,
    /// The persisted record.
    pub record: MergedRecord,
    /// Sink acknowledgement.
    pub ack: PersistAck,
    /// Context values the merge engine had to skip.
    pub anomalies: Vec<MergeAnomaly>,
    /// Wall time of the run.
    pub duration_ms: f64,
}

/// The single caller-visible failure of a run.
#[derive(Debug, Error)]
#[error("run {run_id} failed: {error}")]
pub struct RunFailure {
    /// Id of the run.
    pub run_id: Uuid,
    /// What went wrong.
    #[source]
    pub error: HireflowError,
    /// The merged record, when the run got as far as merging.
    pub record: Option<MergedRecord>,
    /// Context state at the time of failure, when the run started.
    pub snapshot: Option<ContextSnapshot>,
}

impl RunFailure {
    /// Creates a failure with no record or snapshot.
    pub fn new(run_id: Uuid, error: impl Into<HireflowError>) -> Self {
        Self {
            run_id,
            error: error.into(),
            record: None,
            snapshot: None,
        }
    }

    /// Attaches the merged record.
    #[must_use]
    pub fn with_record(mut self, record: MergedRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// Attaches the context snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: ContextSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Builds the error envelope returned to callers.
    ///
    /// The snapshot is left out; it is for logs and tests.
    #[must_use]
    pub fn to_envelope(&self) -> Value {
        let mut envelope = serde_json::Map::new();
        envelope.insert("error".to_string(), self.error.to_dict());
        envelope.insert("run_id".to_string(), json!(self.run_id.to_string()));
        if let Some(record) = &self.record {
            envelope.insert("record".to_string(), record.to_row());
        }
        Value::Object(envelope)
    }
}

/// Owns the run context lifecycle for each request.
#[derive(Clone)]
pub struct PipelineDriver {
    pipeline: Arc<PipelineDefinition>,
    merge: MergeEngine,
    persister: RecordPersister,
    event_sink: Arc<dyn EventSink>,
}

impl PipelineDriver {
    /// Creates a driver for `pipeline` persisting through `persister`.
    pub fn new(pipeline: PipelineDefinition, persister: RecordPersister) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            merge: MergeEngine::new(),
            persister,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the merge engine.
    #[must_use]
    pub fn with_merge_engine(mut self, merge: MergeEngine) -> Self {
        self.merge = merge;
        self
    }

    /// Sets the sink every run's events go to.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pipeline definition.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    /// Runs one evaluation end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure`] for invalid input (the run never starts), the
    /// first stage failure, or a persistence failure. A persistence failure
    /// still carries the merged record.
    pub async fn run(&self, request: EvaluationRequest) -> Result<RunReport, RunFailure> {
        let identity = RunIdentity::new();
        let span = run_span(&identity);
        self.run_with_identity(identity, request).instrument(span).await
    }

    async fn run_with_identity(
        &self,
        identity: RunIdentity,
        request: EvaluationRequest,
    ) -> Result<RunReport, RunFailure> {
        let run_id = identity.run_id;
        let start = Instant::now();

        let job_description = match request.validate().await {
            Ok(value) => value,
            Err(e) => {
                info!(%run_id, error = %e, "request rejected");
                return Err(RunFailure::new(run_id, e));
            }
        };

        let ctx = RunContext::seeded(identity, request.profile_path.trim(), job_description)
            .with_event_sink(self.event_sink.clone());
        ctx.try_emit_event(
            "pipeline.started",
            json!({"pipeline": self.pipeline.name(), "profile_path": request.profile_path.trim()}),
        );

        let outcome = self.pipeline.run(&ctx).await;
        ctx.seal();
        let snapshot = ctx.snapshot();

        if let Err(e) = outcome {
            error!(%run_id, stage = %e.stage, error = %e, "pipeline failed");
            ctx.try_emit_event(
                "pipeline.failed",
                json!({"stage": e.stage.as_str(), "error": e.to_string()}),
            );
            return Err(RunFailure::new(run_id, e).with_snapshot(snapshot));
        }

        let merged = self.merge.merge_with_report(&snapshot);
        ctx.try_emit_event(
            "merge.completed",
            json!({
                "fields": merged.record.len(),
                "anomalies": merged.anomalies.len(),
            }),
        );

        match self.persister.persist(&merged.record).await {
            Ok(ack) => {
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                ctx.try_emit_event(
                    "persist.completed",
                    json!({"table": ack.table.as_str(), "fingerprint": ack.fingerprint.as_str()}),
                );
                ctx.try_emit_event("pipeline.completed", json!({"duration_ms": duration_ms}));
                info!(%run_id, fields = merged.record.len(), duration_ms, "pipeline completed");
                Ok(RunReport {
                    run_id,
                    record: merged.record,
                    ack,
                    anomalies: merged.anomalies,
                    duration_ms,
                })
            }
            Err(e) => {
                ctx.try_emit_event(
                    "persist.failed",
                    json!({"table": self.persister.table(), "error": e.to_string()}),
                );
                ctx.try_emit_event("pipeline.failed", json!({"error": e.to_string()}));
                Err(RunFailure::new(run_id, e)
                    .with_record(merged.record)
                    .with_snapshot(snapshot))
            }
        }
    }
}

impl std::fmt::Debug for PipelineDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDriver")
            .field("pipeline", &self.pipeline.name())
            .field("persister", &self.persister)
            .finish_non_exhaustive()
    }
}
