//! Canned collaborator responses for a welder candidate.

use super::{CannedModelClient, StaticExtractor};
use crate::collaborators::{Collaborators, SimulatedEnricher};
use crate::pipeline::stage_ids;
use serde_json::{json, Value};
use std::sync::Arc;

/// Resume text returned by [`resume_extractor`].
pub const RESUME_TEXT: &str = "Jane Doe\njane@example.com | Houston, TX\n\
Certified welder with eight years of pipeline and structural experience.\n\
Skills: TIG, MIG, Blueprint Reading\n\
Certifications: AWS Certified Welder (2019-2025)\n\
LinkedIn: https://www.linkedin.com/in/janedoe";

/// A job description for a senior pipe welder.
#[must_use]
pub fn job_description() -> Value {
    json!({
        "title": "Senior Pipe Welder",
        "location": "Houston, TX",
        "requirements": ["5+ years pipe welding", "TIG and MIG", "Valid AWS certification"],
        "nice_to_have": ["API 1104"]
    })
}

/// Output of the profile-formatting stage.
#[must_use]
pub fn structured_profile() -> Value {
    json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": null,
        "location": "Houston, TX",
        "summary": "Certified welder with eight years of pipeline and structural experience.",
        "skills": ["TIG", "MIG", "Blueprint Reading"],
        "education": [],
        "experience": [],
        "certifications": [{"name": "AWS Certified Welder", "start_year": "2019", "end_year": "2025"}],
        "languages": ["English"],
        "projects": [],
        "linkedin": "https://www.linkedin.com/in/janedoe",
        "github": null
    })
}

/// Output of the job-description parser.
#[must_use]
pub fn job_requirements() -> Value {
    json!({
        "job_title": "Senior Pipe Welder",
        "required_skills": ["TIG", "MIG"],
        "experience_required": "5+ years",
        "certifications_required": ["AWS Certified Welder"],
        "location": "Houston, TX"
    })
}

/// Output of the attribute matcher.
#[must_use]
pub fn attribute_scores() -> Value {
    json!({
        "skill_match": 90,
        "experience_match": 85,
        "education_match": 60,
        "certification_match": 80,
        "overall_fit": 82
    })
}

/// Output of semantic scoring.
#[must_use]
pub fn semantic_match() -> Value {
    json!({
        "semantic_score": 84,
        "ranking": "strong",
        "explanation": "Hands-on pipeline welding matches the role closely."
    })
}

/// Output of the final ranking stage. `ranking` is shadowed by semantic scoring.
#[must_use]
pub fn final_ranking() -> Value {
    json!({
        "final_score": 83,
        "ranking": "top 10%",
        "summary": "Strong fit with a certification renewal due."
    })
}

/// Output of gap flagging.
#[must_use]
pub fn flagged_gaps() -> Value {
    json!({
        "flagged_issues": [
            {
                "issue": "cert_expiring",
                "description": "AWS certification ends in 2025",
                "severity": "medium",
                "resolution": "Request renewal proof"
            },
            {
                "issue": "no_api_1104",
                "description": "No API 1104 qualification listed",
                "severity": "low",
                "resolution": "Ask during interview"
            }
        ]
    })
}

/// Output of interview question generation.
#[must_use]
pub fn interview_questions() -> Value {
    json!({
        "interview_questions": [
            {"category": "technical", "question": "How do you control heat input on thin-wall pipe?", "rationale": "TIG depth"},
            {"category": "safety", "question": "Walk us through your hot-work permit routine."}
        ],
        "skill_assessments": [
            {"assessment_type": "practical", "description": "6G pipe coupon", "rationale": "Position coverage"}
        ]
    })
}

/// A model client answering every model stage of the workflow.
#[must_use]
pub fn canned_model() -> CannedModelClient {
    CannedModelClient::new()
        .respond_json(stage_ids::FORMAT_PROFILE, &structured_profile())
        .respond_json(stage_ids::JD_PARSER, &job_requirements())
        .respond_json(stage_ids::PROFILE_JD_MATCHER, &attribute_scores())
        .respond_json(stage_ids::SEMANTIC_SCORING, &semantic_match())
        .respond_json(stage_ids::FINAL_RANKING, &final_ranking())
        .respond_json(stage_ids::GAP_FLAGGING, &flagged_gaps())
        .respond_json(stage_ids::INTERVIEW_QUESTIONS, &interview_questions())
}

/// An extractor returning [`RESUME_TEXT`].
#[must_use]
pub fn resume_extractor() -> StaticExtractor {
    StaticExtractor::text(RESUME_TEXT)
}

/// Collaborators wired with canned responses and the simulated enricher.
#[must_use]
pub fn canned_collaborators() -> Collaborators {
    Collaborators::new(
        Arc::new(resume_extractor()),
        Arc::new(canned_model()),
        Arc::new(SimulatedEnricher),
    )
}
