//! The fixed candidate-evaluation workflow graph.

use super::builder::{PipelineBuilder, PipelineDefinition};
use super::prompts::{self, TaskPrompt};
use crate::collaborators::{Collaborators, EnrichmentExecutor, ExtractionExecutor, LlmTaskExecutor};
use crate::context::ContextKey;
use crate::errors::PipelineValidationError;
use crate::stages::{Stage, TaskStage};
use std::sync::Arc;

/// Name of the root sequential stage.
pub const PIPELINE_NAME: &str = "candidate_evaluation";

/// Stage ids of the workflow.
pub mod stage_ids {
    /// Parallel group running the resume branch next to job-description parsing.
    pub const RESUME_AND_JD: &str = "resume_and_jd_parallel";
    /// Sequential resume branch.
    pub const RESUME_EXTRACTION: &str = "resume_extraction";
    /// Resume file to plain text.
    pub const EXTRACT_TEXT: &str = "extract_text";
    /// Plain text to the structured resume profile.
    pub const FORMAT_PROFILE: &str = "format_profile";
    /// Job description to structured requirements.
    pub const JD_PARSER: &str = "jd_parser";
    /// Per-attribute scores of profile against requirements.
    pub const PROFILE_JD_MATCHER: &str = "profile_jd_matcher";
    /// Holistic semantic match score.
    pub const SEMANTIC_SCORING: &str = "semantic_scoring";
    /// Final score and ranking.
    pub const FINAL_RANKING: &str = "final_ranking";
    /// LinkedIn enrichment of the structured profile.
    pub const EXTERNAL_ENRICHMENT: &str = "external_enrichment";
    /// Gaps and red flags in the profile.
    pub const GAP_FLAGGING: &str = "gap_flagging";
    /// Suggested interview questions.
    pub const INTERVIEW_QUESTIONS: &str = "interview_questions";
}

fn model_task(
    collaborators: &Collaborators,
    id: &str,
    prompt: TaskPrompt,
    output: ContextKey,
    inputs: &[ContextKey],
) -> TaskStage {
    let executor = LlmTaskExecutor::new(
        id,
        prompt.instruction,
        prompt.prompt_template(),
        collaborators.model.clone(),
    );
    TaskStage::new(id, output, Arc::new(executor)).with_inputs(inputs.iter().copied())
}

/// Builds the evaluation workflow:
///
/// ```text
/// [ extract_text -> format_profile ] || jd_parser
///   -> profile_jd_matcher -> semantic_scoring -> final_ranking
///   -> external_enrichment -> gap_flagging -> interview_questions
/// ```
///
/// # Errors
///
/// Returns an error only if the graph breaks the producer/consumer rules,
/// which the builder checks on every call.
pub fn candidate_evaluation_pipeline(
    collaborators: &Collaborators,
) -> Result<PipelineDefinition, PipelineValidationError> {
    use stage_ids as ids;
    use ContextKey as K;

    let extract = TaskStage::new(
        ids::EXTRACT_TEXT,
        K::ExtractedText,
        Arc::new(ExtractionExecutor::new(collaborators.extractor.clone())),
    )
    .with_input(K::ProfilePath);

    let format = TaskStage::new(
        ids::FORMAT_PROFILE,
        K::StructuredProfile,
        Arc::new(
            LlmTaskExecutor::new(
                ids::FORMAT_PROFILE,
                prompts::FORMAT_PROFILE.instruction,
                prompts::FORMAT_PROFILE.prompt_template(),
                collaborators.model.clone(),
            )
            .with_schema(prompts::resume_schema()),
        ),
    )
    .with_input(K::ExtractedText);

    let jd_parser = model_task(
        collaborators,
        ids::JD_PARSER,
        prompts::JD_PARSER,
        K::JobRequirements,
        &[K::JobDescription],
    );

    let enrichment = TaskStage::new(
        ids::EXTERNAL_ENRICHMENT,
        K::EnrichedProfile,
        Arc::new(EnrichmentExecutor::new(collaborators.enricher.clone())),
    )
    .with_input(K::StructuredProfile);

    PipelineBuilder::new(PIPELINE_NAME)
        .stage(Stage::parallel(
            ids::RESUME_AND_JD,
            vec![
                Stage::sequential(ids::RESUME_EXTRACTION, vec![extract.into(), format.into()]),
                jd_parser.into(),
            ],
        ))?
        .stage(model_task(
            collaborators,
            ids::PROFILE_JD_MATCHER,
            prompts::PROFILE_JD_MATCHER,
            K::AttributeScores,
            &[K::StructuredProfile, K::JobRequirements],
        ))?
        .stage(model_task(
            collaborators,
            ids::SEMANTIC_SCORING,
            prompts::SEMANTIC_SCORING,
            K::SemanticMatch,
            &[K::StructuredProfile, K::JobRequirements],
        ))?
        .stage(model_task(
            collaborators,
            ids::FINAL_RANKING,
            prompts::FINAL_RANKING,
            K::FinalRanking,
            &[K::AttributeScores, K::SemanticMatch],
        ))?
        .stage(enrichment)?
        .stage(model_task(
            collaborators,
            ids::GAP_FLAGGING,
            prompts::GAP_FLAGGING,
            K::FlaggedGaps,
            &[K::StructuredProfile, K::EnrichedProfile, K::JobRequirements],
        ))?
        .stage(model_task(
            collaborators,
            ids::INTERVIEW_QUESTIONS,
            prompts::INTERVIEW_QUESTIONS,
            K::InterviewQuestions,
            &[K::StructuredProfile, K::EnrichedProfile, K::JobRequirements],
        ))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SimulatedEnricher;
    use crate::stages::StageId;
    use crate::testing::{CannedModelClient, StaticExtractor};
    use std::collections::BTreeSet;

    fn collaborators() -> Collaborators {
        Collaborators::new(
            Arc::new(StaticExtractor::text("resume")),
            Arc::new(CannedModelClient::new()),
            Arc::new(SimulatedEnricher),
        )
    }

    #[test]
    fn test_workflow_builds() {
        let pipeline = candidate_evaluation_pipeline(&collaborators()).unwrap();

        let ids: Vec<StageId> = [
            stage_ids::EXTRACT_TEXT,
            stage_ids::FORMAT_PROFILE,
            stage_ids::JD_PARSER,
            stage_ids::PROFILE_JD_MATCHER,
            stage_ids::SEMANTIC_SCORING,
            stage_ids::FINAL_RANKING,
            stage_ids::EXTERNAL_ENRICHMENT,
            stage_ids::GAP_FLAGGING,
            stage_ids::INTERVIEW_QUESTIONS,
        ]
        .into_iter()
        .map(StageId::from)
        .collect();

        assert_eq!(pipeline.name(), PIPELINE_NAME);
        assert_eq!(pipeline.task_ids(), ids);
    }

    #[test]
    fn test_workflow_produces_every_merge_input() {
        let pipeline = candidate_evaluation_pipeline(&collaborators()).unwrap();

        let all: BTreeSet<ContextKey> = ContextKey::ALL.into_iter().collect();
        assert_eq!(pipeline.outputs(), &all);
    }

    #[test]
    fn test_first_stage_is_parallel_group() {
        let pipeline = candidate_evaluation_pipeline(&collaborators()).unwrap();

        let first = &pipeline.root().children()[0];
        assert_eq!(first.kind(), "parallel");
        assert_eq!(first.id().as_str(), stage_ids::RESUME_AND_JD);
        assert_eq!(first.children()[0].kind(), "sequential");
    }
}
