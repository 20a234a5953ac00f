//! Error types for the hireflow pipeline.
//!
//! The taxonomy follows the ways a run can end: invalid caller input (the run
//! never starts), a failed stage, a rejected persistence write, or a pipeline
//! definition that fails static validation at construction time.

use crate::context::ContextKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for hireflow operations.
#[derive(Debug, Error)]
pub enum HireflowError {
    /// The caller supplied an unusable request.
    #[error("{0}")]
    Input(#[from] InputError),

    /// A stage failed while executing.
    #[error("{0}")]
    StageExecution(#[from] StageError),

    /// The merged record could not be persisted.
    #[error("{0}")]
    Persist(#[from] PersistError),

    /// The static pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HireflowError {
    /// Returns the stable kind name used in caller-visible envelopes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_error",
            Self::StageExecution(_) => "stage_execution_failure",
            Self::Persist(_) => "persist_error",
            Self::Validation(_) => "pipeline_validation_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns the failing stage, if the error originated in one.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageExecution(err) => Some(&err.stage),
            _ => None,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Some(stage) = self.stage() {
            map.insert("stage".to_string(), serde_json::json!(stage));
        }
        if let Self::Persist(PersistError::Rejected { errors, .. }) = self {
            map.insert("row_errors".to_string(), serde_json::json!(errors));
        }
        if let Self::Validation(err) = self {
            if let Some(ref info) = err.error_info {
                map.insert("code".to_string(), serde_json::json!(info.code));
            }
        }
        serde_json::Value::Object(map)
    }
}

/// Errors in the caller's request, surfaced before a run starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// No profile path was supplied.
    #[error("Invalid input: profile_path is empty")]
    MissingProfilePath,

    /// The profile path does not point at a readable file.
    #[error("Invalid input: profile file '{path}' does not exist")]
    ProfileNotFound {
        /// The offending path.
        path: String,
    },

    /// The job description is not a JSON object.
    #[error("Invalid input: job_description must be a JSON object ({reason})")]
    InvalidJobDescription {
        /// Why it was rejected.
        reason: String,
    },
}

/// Error raised when a task stage fails.
///
/// A failed task writes nothing to the run context.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed: {source}")]
pub struct StageError {
    /// Id of the task stage that failed.
    pub stage: String,
    /// The collaborator failure.
    #[source]
    pub source: ExecutorError,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, source: ExecutorError) -> Self {
        Self {
            stage: stage.into(),
            source,
        }
    }
}

/// Failure kinds reported by an external task collaborator.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The collaborator returned output that is not valid JSON.
    #[error("malformed output: {0}")]
    MalformedOutput(String),

    /// The output is JSON but misses fields the stage's schema requires.
    #[error("schema mismatch: missing fields [{}]", missing.join(", "))]
    SchemaMismatch {
        /// Required fields that were absent.
        missing: Vec<String>,
    },

    /// The collaborator could not be reached or refused the call.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// A required input the executor cannot work without was absent.
    #[error("required input '{0}' is absent")]
    MissingInput(ContextKey),

    /// Document text extraction failed.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
}

/// Errors from the document extraction collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The path is empty or not valid UTF-8.
    #[error("Invalid file path")]
    InvalidPath,

    /// The file extension is not one the extractor understands.
    #[error("Unsupported file type: '{extension}'")]
    UnsupportedFileType {
        /// The lowercased extension, empty if none.
        extension: String,
    },

    /// The file exists but could not be read or parsed.
    #[error("Error reading '{path}': {reason}")]
    Unreadable {
        /// The file path or object name.
        path: String,
        /// Underlying reason.
        reason: String,
    },
}

/// Errors from an object store used by the bucket scanner.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists under the name.
    #[error("Object '{0}' not found")]
    NotFound(String),

    /// The object name is empty or escapes the store root.
    #[error("Invalid object name '{0}'")]
    InvalidName(String),

    /// Local IO failed.
    #[error("Object store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A per-row rejection reported by the warehouse sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Index of the rejected row within the batch.
    pub index: usize,
    /// Short machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl RowError {
    /// Creates a new row error.
    #[must_use]
    pub fn new(index: usize, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Transport-level failures of a warehouse sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be reached or answered with a failure status.
    #[error("sink transport error: {0}")]
    Transport(String),

    /// Rows could not be serialized for the sink.
    #[error("sink serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local IO failed.
    #[error("sink IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal persistence failure for a run. Never retried.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The sink accepted the call but rejected the row.
    #[error("Persist rejected by '{table}': {} row error(s)", errors.len())]
    Rejected {
        /// Destination table.
        table: String,
        /// Per-row errors returned by the sink.
        errors: Vec<RowError>,
    },

    /// The sink call itself failed.
    #[error("Persist failed for '{table}': {source}")]
    Sink {
        /// Destination table.
        table: String,
        /// Underlying sink failure.
        #[source]
        source: SinkError,
    },
}

/// Errors while loading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable required by the selected setup is not set.
    #[error("Required environment variable '{0}' is not set")]
    Missing(String),

    /// A variable is set but cannot be used.
    #[error("Invalid value for '{var}': {reason}")]
    Invalid {
        /// The variable name.
        var: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-MISSING-INPUT").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition fails static validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("CONTRACT-EMPTY", "Test error")
            .with_fix_hint("Add a stage")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "CONTRACT-EMPTY");
        assert_eq!(info.fix_hint, Some("Add a stage".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_stage_error_display() {
        let err = StageError::new("jd_parser", ExecutorError::MalformedOutput("not json".into()));
        let text = err.to_string();
        assert!(text.contains("jd_parser"));
        assert!(text.contains("not json"));
    }

    #[test]
    fn test_schema_mismatch_lists_fields() {
        let err = ExecutorError::SchemaMismatch {
            missing: vec!["name".into(), "skills".into()],
        };
        assert_eq!(err.to_string(), "schema mismatch: missing fields [name, skills]");
    }

    #[test]
    fn test_hireflow_error_kind_and_stage() {
        let err = HireflowError::from(StageError::new(
            "profile_jd_matcher",
            ExecutorError::Unavailable("503".into()),
        ));
        assert_eq!(err.kind(), "stage_execution_failure");
        assert_eq!(err.stage(), Some("profile_jd_matcher"));

        let dict = err.to_dict();
        assert_eq!(dict["stage"], "profile_jd_matcher");
        assert_eq!(dict["kind"], "stage_execution_failure");
    }

    #[test]
    fn test_persist_rejected_to_dict_carries_row_errors() {
        let err = HireflowError::from(PersistError::Rejected {
            table: "candidate_cv.welder_profile_v1".into(),
            errors: vec![RowError::new(0, "invalid", "no such field: foo")],
        });
        let dict = err.to_dict();
        assert_eq!(dict["kind"], "persist_error");
        assert_eq!(dict["row_errors"][0]["reason"], "invalid");
    }

    #[test]
    fn test_input_error_messages() {
        let err = InputError::ProfileNotFound {
            path: "/tmp/missing.pdf".into(),
        };
        assert!(err.to_string().contains("/tmp/missing.pdf"));
        assert_eq!(HireflowError::from(err).kind(), "input_error");
    }
}
