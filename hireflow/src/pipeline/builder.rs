//! Pipeline builder with static validation.

use crate::context::{ContextKey, RunContext};
use crate::errors::{ContractErrorInfo, PipelineValidationError, StageError};
use crate::stages::{Stage, StageId};
use std::collections::{BTreeSet, HashSet};

/// Builder for creating validated pipelines.
///
/// Every stage is checked as it is added: its required inputs must be seeded
/// or produced by a stage added before it.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    seeds: BTreeSet<ContextKey>,
    available: BTreeSet<ContextKey>,
    seen_ids: HashSet<StageId>,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    /// Creates a builder whose runs are seeded with [`ContextKey::SEEDS`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let seeds: BTreeSet<ContextKey> = ContextKey::SEEDS.into_iter().collect();
        Self {
            seen_ids: HashSet::from([StageId::from(name.as_str())]),
            available: seeds.clone(),
            seeds,
            name,
            stages: Vec::new(),
        }
    }

    /// Replaces the set of caller-seeded names.
    ///
    /// Must be called before any stage is added.
    #[must_use]
    pub fn with_seeds(mut self, seeds: impl IntoIterator<Item = ContextKey>) -> Self {
        self.seeds = seeds.into_iter().collect();
        self.available = self.seeds.clone();
        self
    }

    /// Appends a top-level stage, run after every stage added before it.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage reads a name nothing earlier produces,
    /// if parallel siblings depend on or collide with each other, if an id is
    /// reused, or if a composite is empty.
    pub fn stage(mut self, stage: impl Into<Stage>) -> Result<Self, PipelineValidationError> {
        let stage = stage.into();
        stage.validate(&mut self.available, &mut self.seen_ids)?;
        self.stages.push(stage);
        Ok(self)
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<PipelineDefinition, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_stages(vec![self.name])
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        Ok(PipelineDefinition {
            root: Stage::sequential(self.name.as_str(), self.stages),
            name: self.name,
            seeds: self.seeds,
            outputs: self.available,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of top-level stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// A validated, immutable stage tree.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    seeds: BTreeSet<ContextKey>,
    outputs: BTreeSet<ContextKey>,
    root: Stage,
}

impl PipelineDefinition {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the names a run must be seeded with.
    #[must_use]
    pub fn seeds(&self) -> &BTreeSet<ContextKey> {
        &self.seeds
    }

    /// Returns every name present after a successful run, seeds included.
    #[must_use]
    pub fn outputs(&self) -> &BTreeSet<ContextKey> {
        &self.outputs
    }

    /// Returns the root sequential stage.
    #[must_use]
    pub fn root(&self) -> &Stage {
        &self.root
    }

    /// Returns all task ids in definition order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<StageId> {
        self.root.task_ids()
    }

    /// Runs the whole tree against `ctx`.
    pub async fn run(&self, ctx: &RunContext) -> Result<(), StageError> {
        self.root.run(ctx).await
    }
}
