//! Composite stages: ordered and concurrent groups of child stages.

use super::{Stage, StageId};
use crate::context::RunContext;
use crate::errors::StageError;
use futures::future::join_all;
use std::time::Instant;
use tracing::{debug, warn};

/// Runs children one after another. The first failure aborts the rest.
#[derive(Debug, Clone)]
pub struct SequentialComposite {
    id: StageId,
    children: Vec<Stage>,
}

impl SequentialComposite {
    /// Creates a sequential composite.
    pub fn new(id: impl Into<StageId>, children: Vec<Stage>) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &StageId {
        &self.id
    }

    /// Returns the children in declared order.
    #[must_use]
    pub fn children(&self) -> &[Stage] {
        &self.children
    }

    /// Runs children in declared order, failing fast.
    pub async fn run(&self, ctx: &RunContext) -> Result<(), StageError> {
        let start = Instant::now();
        for (position, child) in self.children.iter().enumerate() {
            if let Err(err) = child.run(ctx).await {
                debug!(
                    run_id = %ctx.identity().run_id,
                    composite = %self.id,
                    failed_child = %child.id(),
                    skipped = self.children.len() - position - 1,
                    "sequential composite aborted"
                );
                return Err(err);
            }
        }
        debug!(
            run_id = %ctx.identity().run_id,
            composite = %self.id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "sequential composite completed"
        );
        Ok(())
    }
}

/// Runs children concurrently against the same context.
///
/// All children run to completion even if one fails; the reported failure is
/// the first one in declaration order. Writes made by successful children stay
/// in the context.
#[derive(Debug, Clone)]
pub struct ParallelComposite {
    id: StageId,
    children: Vec<Stage>,
}

impl ParallelComposite {
    /// Creates a parallel composite.
    pub fn new(id: impl Into<StageId>, children: Vec<Stage>) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &StageId {
        &self.id
    }

    /// Returns the children.
    #[must_use]
    pub fn children(&self) -> &[Stage] {
        &self.children
    }

    /// Runs all children and waits for every one of them.
    pub async fn run(&self, ctx: &RunContext) -> Result<(), StageError> {
        let start = Instant::now();
        let results = join_all(self.children.iter().map(|child| child.run(ctx))).await;

        let mut failures = results.into_iter().filter_map(Result::err);
        let first = failures.next();
        let others = failures.count();

        match first {
            Some(err) => {
                warn!(
                    run_id = %ctx.identity().run_id,
                    composite = %self.id,
                    failed_stage = %err.stage,
                    additional_failures = others,
                    "parallel composite failed"
                );
                Err(err)
            }
            None => {
                debug!(
                    run_id = %ctx.identity().run_id,
                    composite = %self.id,
                    children = self.children.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "parallel composite completed"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextKey, RunIdentity};
    use crate::stages::TaskStage;
    use crate::testing::ScriptedExecutor;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn task(id: &str, output: ContextKey, executor: ScriptedExecutor) -> Stage {
        Stage::Task(TaskStage::new(id, output, Arc::new(executor)))
    }

    #[tokio::test]
    async fn test_sequential_fails_fast() {
        let ctx = RunContext::new(RunIdentity::new());
        let last = Arc::new(ScriptedExecutor::ok(json!({})));
        let composite = SequentialComposite::new(
            "seq",
            vec![
                task("a", ContextKey::AttributeScores, ScriptedExecutor::ok(json!({"a": 1}))),
                task("b", ContextKey::SemanticMatch, ScriptedExecutor::unavailable("down")),
                Stage::Task(TaskStage::new("c", ContextKey::FinalRanking, last.clone())),
            ],
        );

        let err = composite.run(&ctx).await.unwrap_err();

        assert_eq!(err.stage, "b");
        assert!(ctx.contains(ContextKey::AttributeScores));
        assert!(!ctx.contains(ContextKey::FinalRanking));
        assert_eq!(last.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_child_sees_earlier_writes() {
        let ctx = RunContext::new(RunIdentity::new());
        let reader = Arc::new(ScriptedExecutor::ok(json!({})));
        let composite = SequentialComposite::new(
            "seq",
            vec![
                task("writer", ContextKey::AttributeScores, ScriptedExecutor::ok(json!({"x": 1}))),
                Stage::Task(
                    TaskStage::new("reader", ContextKey::FinalRanking, reader.clone())
                        .with_input(ContextKey::AttributeScores),
                ),
            ],
        );

        composite.run(&ctx).await.unwrap();

        let seen = reader.recorded_inputs();
        assert_eq!(seen[0].get(ContextKey::AttributeScores), Some(&json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_parallel_lets_siblings_finish_and_keeps_their_writes() {
        let ctx = RunContext::new(RunIdentity::new());
        let composite = ParallelComposite::new(
            "par",
            vec![
                task("fails", ContextKey::StructuredProfile, ScriptedExecutor::unavailable("boom")),
                task(
                    "slow_ok",
                    ContextKey::JobRequirements,
                    ScriptedExecutor::ok(json!({"skills": ["welding"]}))
                        .with_delay(Duration::from_millis(20)),
                ),
            ],
        );

        let err = composite.run(&ctx).await.unwrap_err();

        assert_eq!(err.stage, "fails");
        assert_eq!(
            ctx.get(ContextKey::JobRequirements),
            Some(json!({"skills": ["welding"]}))
        );
        assert!(!ctx.contains(ContextKey::StructuredProfile));
    }

    #[tokio::test]
    async fn test_parallel_reports_first_failure_by_declaration_order() {
        let ctx = RunContext::new(RunIdentity::new());
        let composite = ParallelComposite::new(
            "par",
            vec![
                task(
                    "first",
                    ContextKey::StructuredProfile,
                    ScriptedExecutor::unavailable("late failure").with_delay(Duration::from_millis(30)),
                ),
                task("second", ContextKey::JobRequirements, ScriptedExecutor::unavailable("early failure")),
            ],
        );

        let err = composite.run(&ctx).await.unwrap_err();
        assert_eq!(err.stage, "first");
    }

    #[tokio::test]
    async fn test_parallel_children_run_concurrently() {
        let ctx = RunContext::new(RunIdentity::new());
        let composite = ParallelComposite::new(
            "par",
            vec![
                task(
                    "a",
                    ContextKey::StructuredProfile,
                    ScriptedExecutor::ok(json!({})).with_delay(Duration::from_millis(50)),
                ),
                task(
                    "b",
                    ContextKey::JobRequirements,
                    ScriptedExecutor::ok(json!({})).with_delay(Duration::from_millis(50)),
                ),
            ],
        );

        let start = Instant::now();
        composite.run(&ctx).await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(95));
        assert_eq!(ctx.len(), 2);
    }
}
