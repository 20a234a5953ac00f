//! # Hireflow
//!
//! Candidate evaluation as a fixed pipeline of stages.
//!
//! Given a resume file and a job description, a run extracts and structures
//! the resume, scores it against the job, enriches the profile, flags gaps,
//! suggests interview questions, then merges every stage result into one flat
//! record and persists it.
//!
//! - **Stages**: task stages call one collaborator and write one named output;
//!   sequential and parallel composites group them
//! - **Static validation**: the builder rejects any stage reading a name that
//!   nothing earlier produces
//! - **Merge engine**: deterministic field precedence across seven stage outputs
//! - **Persistence**: one-row batches to a warehouse sink, no retries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hireflow::prelude::*;
//!
//! let config = HireflowConfig::from_env()?;
//! let pipeline = candidate_evaluation_pipeline(&config.collaborators()?)?;
//! let persister = RecordPersister::new(config.warehouse_sink()?).with_table(config.table.clone());
//! let driver = PipelineDriver::new(pipeline, persister);
//!
//! let report = driver
//!     .run(EvaluationRequest::new("resume.pdf", serde_json::json!({"title": "Welder"})))
//!     .await?;
//! println!("{}", report.record.to_row());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod collaborators;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod merge;
pub mod observability;
pub mod persistence;
pub mod pipeline;
pub mod stages;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collaborators::{
        Collaborators, DocumentExtractor, ModelClient, ProfileEnricher, TextExtractor,
    };
    pub use crate::config::{HireflowConfig, SinkConfig};
    pub use crate::context::{ContextKey, ContextSnapshot, RunContext, RunIdentity};
    pub use crate::errors::{
        ContractErrorInfo, ExecutorError, HireflowError, InputError, PersistError,
        PipelineValidationError, StageError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::merge::{MergeEngine, MergedRecord};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::persistence::{PersistAck, RecordPersister, WarehouseSink};
    pub use crate::pipeline::{
        candidate_evaluation_pipeline, EvaluationRequest, PipelineBuilder, PipelineDefinition,
        PipelineDriver, RunFailure, RunReport,
    };
    pub use crate::stages::{Stage, StageId, TaskExecutor, TaskStage};
}
