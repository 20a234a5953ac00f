//! Pipeline building and execution.
//!
//! This module provides:
//! - The pipeline builder with static producer/consumer validation
//! - The fixed candidate-evaluation workflow and its prompts
//! - The driver that runs the workflow, merges and persists the result

mod builder;
mod driver;
pub mod prompts;
mod workflow;

pub use builder::{PipelineBuilder, PipelineDefinition};
pub use driver::{EvaluationRequest, PipelineDriver, RunFailure, RunReport};
pub use workflow::{candidate_evaluation_pipeline, stage_ids, PIPELINE_NAME};
