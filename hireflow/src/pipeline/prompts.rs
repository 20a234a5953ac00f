//! Instruction texts and prompt templates for the model stages.

use crate::collaborators::{OutputSchema, PromptTemplate};

/// Instruction and user-prompt template for one model stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPrompt {
    /// System instruction sent with every call.
    pub instruction: &'static str,
    /// User prompt with `{{name}}` placeholders.
    pub template: &'static str,
}

impl TaskPrompt {
    /// Returns the template as a [`PromptTemplate`].
    #[must_use]
    pub fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate::new(self.template)
    }
}

/// Turns extracted resume text into the profile schema.
pub const FORMAT_PROFILE: TaskPrompt = TaskPrompt {
    instruction: "You convert unstructured resume text into structured JSON. \
Copy information exactly as it appears in the text and never infer or add anything. \
Return one JSON object with the fields name, email, phone, location, summary, skills, \
education, experience, certifications, languages, projects, linkedin and github. \
Use empty strings, empty lists or null where the text has no data. \
education entries have degree, institution, start_year and end_year. \
experience entries have job_title, company, start_year, end_year and description. \
certifications entries have name, provider, certificate_url, start_year and end_year.",
    template: "Resume text:\n{{extracted_text}}",
};

/// Pulls the key requirements out of a job description.
pub const JD_PARSER: TaskPrompt = TaskPrompt {
    instruction: "You extract the key information from a job description. \
Return one JSON object with the fields job_title, required_skills, preferred_skills, \
experience_required, education_required, certifications_required, location and \
responsibilities. Use empty strings or empty lists where the description has no data.",
    template: "Job description:\n{{job_description}}",
};

/// Scores the profile attribute by attribute.
pub const PROFILE_JD_MATCHER: TaskPrompt = TaskPrompt {
    instruction: "You compare a structured resume against job requirements and compute \
attribute match scores. Return one JSON object with the fields skill_match, \
experience_match, education_match, certification_match and overall_fit.",
    template: "Resume data:\n{{structured_profile}}\n\nJob requirements:\n{{job_requirements}}",
};

/// Semantic similarity score with a short explanation.
pub const SEMANTIC_SCORING: TaskPrompt = TaskPrompt {
    instruction: "You assess how well a candidate's qualifications and experience match a \
job's requirements using semantic similarity and job-role ontologies. Rank the candidate \
and give a semantic match score from 0 to 100 with a brief explanation. Return one JSON \
object with the fields semantic_score, ranking and explanation.",
    template: "Resume data:\n{{structured_profile}}\n\nJob requirements:\n{{job_requirements}}",
};

/// Aggregates both scores into the final ranking.
pub const FINAL_RANKING: TaskPrompt = TaskPrompt {
    instruction: "You aggregate attribute scores and a semantic match into a final \
candidate ranking. Give an overall match percentage and a summary explanation. Return one \
JSON object with the fields final_score, ranking and summary.",
    template: "Attribute scores:\n{{attribute_scores}}\n\nSemantic match:\n{{semantic_match}}",
};

/// Flags gaps such as expired certifications or missing skills.
pub const GAP_FLAGGING: TaskPrompt = TaskPrompt {
    instruction: "You look for mismatches and gaps in a candidate profile, such as expired \
certifications or missing critical skills. Return one JSON object with a flagged_issues \
list. Each entry is an object with the fields issue, description, severity and resolution.",
    template: "Candidate profile:\n{{structured_profile}}\n\nEnrichment:\n{{enriched_profile}}\n\n\
Job requirements:\n{{job_requirements}}",
};

/// Suggests interview questions and skill assessments.
pub const INTERVIEW_QUESTIONS: TaskPrompt = TaskPrompt {
    instruction: "You suggest interview questions and skill assessments tailored to a job \
role and a candidate's background. Return one JSON object with the fields \
interview_questions and skill_assessments. Each interview_questions entry is an object \
with category and question. Each skill_assessments entry is an object with \
assessment_type, description and rationale.",
    template: "Candidate profile:\n{{structured_profile}}\n\nEnrichment:\n{{enriched_profile}}\n\n\
Job requirements:\n{{job_requirements}}",
};

/// Output schema of the structured-profile stage. Only `name` is required.
#[must_use]
pub fn resume_schema() -> OutputSchema {
    OutputSchema::new([
        "name",
        "email",
        "phone",
        "location",
        "summary",
        "skills",
        "education",
        "experience",
        "certifications",
        "languages",
        "projects",
        "linkedin",
        "github",
    ])
    .require("name")
}
