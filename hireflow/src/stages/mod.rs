//! Stage abstraction.
//!
//! A stage is either a task (one collaborator call, one named output) or a
//! composite grouping child stages sequentially or in parallel. Stage trees
//! are fixed at construction and validated statically by the pipeline builder.

mod composite;
mod task;

pub use composite::{ParallelComposite, SequentialComposite};
pub use task::{TaskExecutor, TaskInputs, TaskStage};

use crate::context::{ContextKey, RunContext};
use crate::errors::{ContractErrorInfo, PipelineValidationError, StageError};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Identifier of a stage within a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(String);

impl StageId {
    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node in the static workflow graph.
#[derive(Debug, Clone)]
pub enum Stage {
    /// A single collaborator call.
    Task(TaskStage),
    /// Children run one after another.
    Sequential(SequentialComposite),
    /// Children run concurrently.
    Parallel(ParallelComposite),
}

impl Stage {
    /// Creates a sequential composite stage.
    pub fn sequential(id: impl Into<StageId>, children: Vec<Self>) -> Self {
        Self::Sequential(SequentialComposite::new(id, children))
    }

    /// Creates a parallel composite stage.
    pub fn parallel(id: impl Into<StageId>, children: Vec<Self>) -> Self {
        Self::Parallel(ParallelComposite::new(id, children))
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &StageId {
        match self {
            Self::Task(t) => t.id(),
            Self::Sequential(s) => s.id(),
            Self::Parallel(p) => p.id(),
        }
    }

    /// Returns the kind name, for logs and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::Sequential(_) => "sequential",
            Self::Parallel(_) => "parallel",
        }
    }

    /// Returns child stages (empty for a task).
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Task(_) => &[],
            Self::Sequential(s) => s.children(),
            Self::Parallel(p) => p.children(),
        }
    }

    /// Every output name written by this stage or its descendants.
    #[must_use]
    pub fn produced_outputs(&self) -> BTreeSet<ContextKey> {
        match self {
            Self::Task(t) => BTreeSet::from([t.output()]),
            _ => self
                .children()
                .iter()
                .flat_map(Self::produced_outputs)
                .collect(),
        }
    }

    /// Ids of every task stage, in declaration order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<StageId> {
        match self {
            Self::Task(t) => vec![t.id().clone()],
            _ => self.children().iter().flat_map(Self::task_ids).collect(),
        }
    }

    /// Runs the stage against the shared context.
    pub fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<(), StageError>> {
        async move {
            match self {
                Self::Task(t) => t.run(ctx).await,
                Self::Sequential(s) => s.run(ctx).await,
                Self::Parallel(p) => p.run(ctx).await,
            }
        }
        .boxed()
    }

    /// Checks the producer/consumer invariant.
    ///
    /// `available` holds every name produced strictly before this stage and is
    /// extended with this stage's outputs on success.
    pub(crate) fn validate(
        &self,
        available: &mut BTreeSet<ContextKey>,
        seen_ids: &mut HashSet<StageId>,
    ) -> Result<(), PipelineValidationError> {
        if !seen_ids.insert(self.id().clone()) {
            return Err(duplicate_id(self.id()));
        }

        match self {
            Self::Task(task) => {
                for input in task.required_inputs() {
                    if !available.contains(input) {
                        return Err(missing_input(task.id(), *input));
                    }
                }
                available.insert(task.output());
                Ok(())
            }
            Self::Sequential(seq) => {
                if seq.children().is_empty() {
                    return Err(empty_composite(seq.id()));
                }
                for child in seq.children() {
                    child.validate(available, seen_ids)?;
                }
                Ok(())
            }
            Self::Parallel(par) => {
                if par.children().is_empty() {
                    return Err(empty_composite(par.id()));
                }
                validate_parallel(par, available, seen_ids)
            }
        }
    }
}

impl From<TaskStage> for Stage {
    fn from(task: TaskStage) -> Self {
        Self::Task(task)
    }
}

fn validate_parallel(
    par: &ParallelComposite,
    available: &mut BTreeSet<ContextKey>,
    seen_ids: &mut HashSet<StageId>,
) -> Result<(), PipelineValidationError> {
    let base = available.clone();
    let mut writers: BTreeMap<ContextKey, StageId> = BTreeMap::new();

    for child in par.children() {
        for output in child.produced_outputs() {
            if let Some(other) = writers.insert(output, child.id().clone()) {
                return Err(output_collision(par.id(), &other, child.id(), output));
            }
        }
    }

    let mut produced = BTreeSet::new();
    for child in par.children() {
        let mut scope = base.clone();
        if let Err(err) = child.validate(&mut scope, seen_ids) {
            let sibling_read = missing_key(&err)
                .and_then(|key| writers.get(&key).map(|writer| (key, writer)))
                .filter(|(_, writer)| *writer != child.id());
            return Err(match sibling_read {
                Some((key, writer)) => sibling_read_error(par.id(), child.id(), writer, key),
                None => err,
            });
        }
        produced.extend(scope.difference(&base).copied());
    }

    available.extend(produced);
    Ok(())
}

fn missing_key(err: &PipelineValidationError) -> Option<ContextKey> {
    err.error_info
        .as_ref()
        .filter(|info| info.code == "CONTRACT-MISSING-INPUT")
        .and_then(|info| info.context.get("input"))
        .and_then(|name| name.parse().ok())
}

fn missing_input(stage: &StageId, input: ContextKey) -> PipelineValidationError {
    PipelineValidationError::new(format!(
        "Stage '{stage}' requires '{input}' which no earlier stage produces"
    ))
    .with_stages(vec![stage.to_string()])
    .with_error_info(
        ContractErrorInfo::new(
            "CONTRACT-MISSING-INPUT",
            format!("Input '{input}' is not available to '{stage}'"),
        )
        .with_fix_hint("Order the producing stage strictly before the consumer, or seed the value.")
        .with_context_entry("input", input.as_str()),
    )
}

fn sibling_read_error(
    group: &StageId,
    reader: &StageId,
    writer: &StageId,
    input: ContextKey,
) -> PipelineValidationError {
    PipelineValidationError::new(format!(
        "Stage '{reader}' reads '{input}' produced by sibling '{writer}' in parallel group '{group}'"
    ))
    .with_stages(vec![reader.to_string(), writer.to_string()])
    .with_error_info(
        ContractErrorInfo::new(
            "CONTRACT-SIBLING-READ",
            format!("'{input}' has no ordering guarantee inside '{group}'"),
        )
        .with_fix_hint("Move the consumer after the parallel group or into the producer's sequence.")
        .with_context_entry("input", input.as_str()),
    )
}

fn output_collision(
    group: &StageId,
    first: &StageId,
    second: &StageId,
    output: ContextKey,
) -> PipelineValidationError {
    PipelineValidationError::new(format!(
        "Stages '{first}' and '{second}' both write '{output}' inside parallel group '{group}'"
    ))
    .with_stages(vec![first.to_string(), second.to_string()])
    .with_error_info(
        ContractErrorInfo::new(
            "CONTRACT-OUTPUT-COLLISION",
            format!("Concurrent writers to '{output}'"),
        )
        .with_fix_hint("Give concurrently running stages disjoint output names."),
    )
}

fn duplicate_id(id: &StageId) -> PipelineValidationError {
    PipelineValidationError::new(format!("Stage id '{id}' is used more than once"))
        .with_stages(vec![id.to_string()])
        .with_error_info(
            ContractErrorInfo::new("CONTRACT-DUPLICATE-ID", format!("Duplicate stage id '{id}'"))
                .with_fix_hint("Give every stage a unique id."),
        )
}

fn empty_composite(id: &StageId) -> PipelineValidationError {
    PipelineValidationError::new(format!("Composite stage '{id}' has no children"))
        .with_stages(vec![id.to_string()])
        .with_error_info(
            ContractErrorInfo::new("CONTRACT-EMPTY", format!("'{id}' is empty"))
                .with_fix_hint("Add at least one child stage."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use serde_json::json;
    use std::sync::Arc;

    fn task(id: &str, output: ContextKey, inputs: &[ContextKey]) -> Stage {
        TaskStage::new(id, output, Arc::new(ScriptedExecutor::ok(json!({}))))
            .with_inputs(inputs.iter().copied())
            .into()
    }

    fn validate(stage: &Stage) -> Result<BTreeSet<ContextKey>, PipelineValidationError> {
        let mut available: BTreeSet<_> = ContextKey::SEEDS.into_iter().collect();
        stage.validate(&mut available, &mut HashSet::new())?;
        Ok(available)
    }

    #[test]
    fn test_produced_outputs_and_task_ids() {
        let stage = Stage::sequential(
            "root",
            vec![
                task("extract", ContextKey::ExtractedText, &[ContextKey::ProfilePath]),
                task("format", ContextKey::StructuredProfile, &[ContextKey::ExtractedText]),
            ],
        );

        assert_eq!(
            stage.produced_outputs(),
            BTreeSet::from([ContextKey::ExtractedText, ContextKey::StructuredProfile])
        );
        assert_eq!(
            stage.task_ids(),
            vec![StageId::from("extract"), StageId::from("format")]
        );
        assert_eq!(stage.kind(), "sequential");
    }

    #[test]
    fn test_valid_sequence_extends_available() {
        let stage = Stage::sequential(
            "root",
            vec![
                task("extract", ContextKey::ExtractedText, &[ContextKey::ProfilePath]),
                task("format", ContextKey::StructuredProfile, &[ContextKey::ExtractedText]),
            ],
        );

        let available = validate(&stage).unwrap();
        assert!(available.contains(&ContextKey::StructuredProfile));
    }

    #[test]
    fn test_input_produced_later_is_rejected() {
        let stage = Stage::sequential(
            "root",
            vec![
                task("format", ContextKey::StructuredProfile, &[ContextKey::ExtractedText]),
                task("extract", ContextKey::ExtractedText, &[ContextKey::ProfilePath]),
            ],
        );

        let err = validate(&stage).unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-MISSING-INPUT"));
        assert_eq!(err.stages, vec!["format".to_string()]);
    }

    #[test]
    fn test_sibling_read_is_rejected() {
        let stage = Stage::parallel(
            "par",
            vec![
                task("jd", ContextKey::JobRequirements, &[ContextKey::JobDescription]),
                task("match", ContextKey::AttributeScores, &[ContextKey::JobRequirements]),
            ],
        );

        let err = validate(&stage).unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-SIBLING-READ"));
    }

    #[test]
    fn test_parallel_output_collision_is_rejected() {
        let stage = Stage::parallel(
            "par",
            vec![
                task("a", ContextKey::JobRequirements, &[]),
                task("b", ContextKey::JobRequirements, &[]),
            ],
        );

        let err = validate(&stage).unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-OUTPUT-COLLISION"));
    }

    #[test]
    fn test_parallel_outputs_available_after_group() {
        let stage = Stage::sequential(
            "root",
            vec![
                Stage::parallel(
                    "par",
                    vec![
                        task("jd", ContextKey::JobRequirements, &[ContextKey::JobDescription]),
                        task("extract", ContextKey::ExtractedText, &[ContextKey::ProfilePath]),
                    ],
                ),
                task(
                    "match",
                    ContextKey::AttributeScores,
                    &[ContextKey::JobRequirements, ContextKey::ExtractedText],
                ),
            ],
        );

        assert!(validate(&stage).is_ok());
    }

    #[test]
    fn test_duplicate_ids_and_empty_composites_are_rejected() {
        let dup = Stage::sequential(
            "root",
            vec![
                task("same", ContextKey::ExtractedText, &[]),
                task("same", ContextKey::JobRequirements, &[]),
            ],
        );
        assert_eq!(validate(&dup).unwrap_err().code(), Some("CONTRACT-DUPLICATE-ID"));

        let empty = Stage::parallel("par", Vec::new());
        assert_eq!(validate(&empty).unwrap_err().code(), Some("CONTRACT-EMPTY"));
    }
}
