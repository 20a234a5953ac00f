//! Typed names for values threaded between stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every name the candidate-evaluation workflow reads or writes.
///
/// Stages declare their inputs and output with these keys, which lets the
/// pipeline builder check the producer/consumer graph before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    /// Path of the resume document, seeded by the caller.
    ProfilePath,
    /// Job description JSON, seeded by the caller.
    JobDescription,
    /// Raw text extracted from the resume.
    ExtractedText,
    /// Resume data structured into the profile schema.
    StructuredProfile,
    /// Requirements parsed out of the job description.
    JobRequirements,
    /// Per-attribute match scores.
    AttributeScores,
    /// Semantic match score and explanation.
    SemanticMatch,
    /// Aggregated ranking and summary.
    FinalRanking,
    /// Profile enriched from the external source.
    EnrichedProfile,
    /// Gaps and mismatches found in the profile.
    FlaggedGaps,
    /// Suggested interview questions and assessments.
    InterviewQuestions,
}

impl ContextKey {
    /// Keys seeded by the caller when a run starts.
    pub const SEEDS: [Self; 2] = [Self::ProfilePath, Self::JobDescription];

    /// Keys read by the merge engine, in merge order.
    pub const MERGE_INPUTS: [Self; 7] = [
        Self::StructuredProfile,
        Self::AttributeScores,
        Self::SemanticMatch,
        Self::InterviewQuestions,
        Self::FinalRanking,
        Self::EnrichedProfile,
        Self::FlaggedGaps,
    ];

    /// All keys.
    pub const ALL: [Self; 11] = [
        Self::ProfilePath,
        Self::JobDescription,
        Self::ExtractedText,
        Self::StructuredProfile,
        Self::JobRequirements,
        Self::AttributeScores,
        Self::SemanticMatch,
        Self::FinalRanking,
        Self::EnrichedProfile,
        Self::FlaggedGaps,
        Self::InterviewQuestions,
    ];

    /// Returns the stable wire name of the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProfilePath => "profile_path",
            Self::JobDescription => "job_description",
            Self::ExtractedText => "extracted_text",
            Self::StructuredProfile => "structured_profile",
            Self::JobRequirements => "job_requirements",
            Self::AttributeScores => "attribute_scores",
            Self::SemanticMatch => "semantic_match",
            Self::FinalRanking => "final_ranking",
            Self::EnrichedProfile => "enriched_profile",
            Self::FlaggedGaps => "flagged_gaps",
            Self::InterviewQuestions => "interview_questions",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown context key '{s}'"))
    }
}
