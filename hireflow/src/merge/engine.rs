//! The eight-step merge of stage results into a flat record.

use super::MergedRecord;
use crate::context::{ContextKey, ContextSnapshot};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

type Fields = Map<String, Value>;

/// Subfields of each flagged issue and the record field each one joins into.
const FLAGGED_FIELDS: [(&str, &str); 4] = [
    ("issue", "flagged_issue"),
    ("description", "flagged_issue_description"),
    ("severity", "flagged_issue_severity"),
    ("resolution", "flagged_issue_resolution"),
];

/// A merge input that was present but unusable, and was skipped.
///
/// Anomalies never fail a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeAnomaly {
    /// The context value the anomaly was found in.
    pub source: ContextKey,
    /// What was wrong with it.
    pub reason: String,
}

impl MergeAnomaly {
    fn new(source: ContextKey, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MergeAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// The record together with the anomalies seen while building it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// The merged record.
    pub record: MergedRecord,
    /// Inputs (or parts of inputs) that were skipped.
    pub anomalies: Vec<MergeAnomaly>,
}

/// Builds a [`MergedRecord`] from the seven merge inputs of a snapshot.
///
/// Absent inputs (missing or `null`) are skipped without a trace. Inputs that
/// are present but not JSON objects are skipped and reported as anomalies.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    skills_separator: String,
    issue_separator: String,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self {
            skills_separator: ", ".to_string(),
            issue_separator: ",".to_string(),
        }
    }
}

impl MergeEngine {
    /// Creates an engine with the default separators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the separator used to join `structured_profile.skills`.
    #[must_use]
    pub fn with_skills_separator(mut self, separator: impl Into<String>) -> Self {
        self.skills_separator = separator.into();
        self
    }

    /// Sets the separator used to join flagged issue subfields.
    #[must_use]
    pub fn with_issue_separator(mut self, separator: impl Into<String>) -> Self {
        self.issue_separator = separator.into();
        self
    }

    /// Merges a snapshot into a record, discarding anomalies.
    #[must_use]
    pub fn merge(&self, snapshot: &ContextSnapshot) -> MergedRecord {
        self.merge_with_report(snapshot).record
    }

    /// Merges a snapshot into a record and reports skipped inputs.
    #[must_use]
    pub fn merge_with_report(&self, snapshot: &ContextSnapshot) -> MergeOutcome {
        let mut anomalies = Vec::new();
        let profile = object_source(snapshot, ContextKey::StructuredProfile, &mut anomalies);
        let scores = object_source(snapshot, ContextKey::AttributeScores, &mut anomalies);
        let semantic = object_source(snapshot, ContextKey::SemanticMatch, &mut anomalies);
        let questions = object_source(snapshot, ContextKey::InterviewQuestions, &mut anomalies);
        let ranking = object_source(snapshot, ContextKey::FinalRanking, &mut anomalies);
        let enriched = object_source(snapshot, ContextKey::EnrichedProfile, &mut anomalies);
        let gaps = object_source(snapshot, ContextKey::FlaggedGaps, &mut anomalies);

        let mut record = MergedRecord::new();
        if let Some(profile) = profile {
            record.extend_overwriting(self.normalize_skills(profile));
        }
        if let Some(scores) = scores {
            record.extend_overwriting(scores.clone());
        }
        if let Some(semantic) = semantic {
            record.extend_overwriting(semantic.clone());
        }
        if let Some(questions) = questions {
            record.extend_overwriting(strip_rationales(questions));
        }
        if let Some(ranking) = ranking {
            apply_final_ranking(&mut record, ranking);
        }
        if let Some(linkedin) = enriched.and_then(|e| e.get("linkedin_profile")) {
            record.insert("linkedin_profile", linkedin.clone());
        }
        if let Some(gaps) = gaps {
            match gaps.get("flagged_issues") {
                None | Some(Value::Null) => {}
                Some(Value::Array(issues)) => self.apply_flagged_issues(&mut record, issues),
                Some(_) => anomalies.push(MergeAnomaly::new(
                    ContextKey::FlaggedGaps,
                    "flagged_issues is not a list",
                )),
            }
        }

        for anomaly in &anomalies {
            warn!(
                run_id = ?snapshot.run_id,
                source = %anomaly.source,
                reason = %anomaly.reason,
                "merge input skipped"
            );
        }
        debug!(
            run_id = ?snapshot.run_id,
            fields = record.len(),
            anomalies = anomalies.len(),
            "merge completed"
        );
        MergeOutcome { record, anomalies }
    }

    /// Joins a list-valued `skills` field into one string.
    fn normalize_skills(&self, profile: &Fields) -> Fields {
        let mut profile = profile.clone();
        let joined = match profile.get("skills") {
            Some(Value::Array(skills)) => Some(
                skills
                    .iter()
                    .map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(self.skills_separator.as_str()),
            ),
            _ => None,
        };
        if let Some(joined) = joined {
            profile.insert("skills".to_string(), Value::String(joined));
        }
        profile
    }

    fn apply_flagged_issues(&self, record: &mut MergedRecord, issues: &[Value]) {
        if issues.is_empty() {
            return;
        }
        for (subfield, field) in FLAGGED_FIELDS {
            let joined = issues
                .iter()
                .map(|issue| {
                    issue
                        .get(subfield)
                        .filter(|v| !v.is_null())
                        .map(scalar_text)
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
                .join(self.issue_separator.as_str());
            record.insert(field, Value::String(joined));
        }
    }
}

/// Looks up a merge input that must be a JSON object.
fn object_source<'a>(
    snapshot: &'a ContextSnapshot,
    key: ContextKey,
    anomalies: &mut Vec<MergeAnomaly>,
) -> Option<&'a Fields> {
    match snapshot.get(key)? {
        Value::Object(fields) => Some(fields),
        other => {
            anomalies.push(MergeAnomaly::new(
                key,
                format!("expected a JSON object, found {}", json_type(other)),
            ));
            None
        }
    }
}

fn strip_rationales(questions: &Fields) -> Fields {
    let mut questions = questions.clone();
    if let Some(Value::Array(items)) = questions.get_mut("interview_questions") {
        for item in items.iter_mut() {
            if let Value::Object(question) = item {
                question.remove("rationale");
            }
        }
    }
    questions
}

/// Fields already in the record win. Writing `ranking` also carries
/// `summary` over as `ranking_summary` when that is not yet set.
fn apply_final_ranking(record: &mut MergedRecord, ranking: &Fields) {
    for (field, value) in ranking {
        if record.contains(field) {
            continue;
        }
        record.insert(field.clone(), value.clone());
        if field == "ranking" && !record.contains("ranking_summary") {
            if let Some(summary) = ranking.get("summary").filter(|v| !v.is_null()) {
                record.insert("ranking_summary", summary.clone());
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Name of a JSON value's type, for diagnostics.
pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(values: Vec<(ContextKey, Value)>) -> ContextSnapshot {
        ContextSnapshot::from_values(values, "test")
    }

    fn merge(values: Vec<(ContextKey, Value)>) -> MergedRecord {
        MergeEngine::new().merge(&snapshot(values))
    }

    #[test]
    fn test_empty_snapshot_gives_empty_record() {
        let record = merge(vec![]);
        assert!(record.is_empty());
    }

    #[test]
    fn test_skills_list_is_joined() {
        let record = merge(vec![(
            ContextKey::StructuredProfile,
            json!({"name": "Ada", "skills": ["Python", "SQL"]}),
        )]);

        assert_eq!(record.get_str("skills"), Some("Python, SQL"));
        assert_eq!(record.get_str("name"), Some("Ada"));
    }

    #[test]
    fn test_non_string_skills_use_json_text() {
        let record = merge(vec![(
            ContextKey::StructuredProfile,
            json!({"skills": ["TIG", 6, true]}),
        )]);
        assert_eq!(record.get_str("skills"), Some("TIG, 6, true"));
    }

    #[test]
    fn test_skills_string_is_left_alone() {
        let record = merge(vec![(
            ContextKey::StructuredProfile,
            json!({"skills": "MIG welding"}),
        )]);
        assert_eq!(record.get_str("skills"), Some("MIG welding"));
    }

    #[test]
    fn test_later_steps_overwrite_earlier_ones() {
        let record = merge(vec![
            (ContextKey::StructuredProfile, json!({"score": "profile"})),
            (ContextKey::AttributeScores, json!({"score": "attributes"})),
            (ContextKey::SemanticMatch, json!({"score": "semantic"})),
        ]);
        assert_eq!(record.get_str("score"), Some("semantic"));
    }

    #[test]
    fn test_attribute_scores_beat_final_ranking() {
        let record = merge(vec![
            (ContextKey::AttributeScores, json!({"overall_fit": 71})),
            (ContextKey::FinalRanking, json!({"overall_fit": 90, "tier": "A"})),
        ]);

        assert_eq!(record.get("overall_fit"), Some(&json!(71)));
        assert_eq!(record.get_str("tier"), Some("A"));
    }

    #[test]
    fn test_rationale_is_stripped_from_questions() {
        let record = merge(vec![(
            ContextKey::InterviewQuestions,
            json!({
                "interview_questions": [
                    {"question": "Describe a TIG weld", "rationale": "core skill"},
                    {"question": "Safety gear?"},
                    "free text"
                ],
                "question_count": 3
            }),
        )]);

        assert_eq!(
            record.get("interview_questions"),
            Some(&json!([
                {"question": "Describe a TIG weld"},
                {"question": "Safety gear?"},
                "free text"
            ]))
        );
        assert_eq!(record.get("question_count"), Some(&json!(3)));
    }

    #[test]
    fn test_ranking_summary_when_ranking_is_new() {
        let record = merge(vec![(
            ContextKey::FinalRanking,
            json!({"ranking": 2, "summary": "strong welder"}),
        )]);

        assert_eq!(record.get("ranking"), Some(&json!(2)));
        assert_eq!(record.get_str("summary"), Some("strong welder"));
        assert_eq!(record.get_str("ranking_summary"), Some("strong welder"));
    }

    #[test]
    fn test_no_ranking_summary_when_ranking_already_set() {
        let record = merge(vec![
            (ContextKey::SemanticMatch, json!({"ranking": 5})),
            (ContextKey::FinalRanking, json!({"ranking": 2, "summary": "strong"})),
        ]);

        assert_eq!(record.get("ranking"), Some(&json!(5)));
        assert!(!record.contains("ranking_summary"));
    }

    #[test]
    fn test_no_ranking_summary_without_summary() {
        let record = merge(vec![(ContextKey::FinalRanking, json!({"ranking": 1}))]);
        assert!(!record.contains("ranking_summary"));
    }

    #[test]
    fn test_no_ranking_summary_without_ranking() {
        let record = merge(vec![(ContextKey::FinalRanking, json!({"summary": "ok"}))]);
        assert!(!record.contains("ranking_summary"));
    }

    #[test]
    fn test_existing_ranking_summary_is_kept() {
        let record = merge(vec![
            (ContextKey::SemanticMatch, json!({"ranking_summary": "earlier"})),
            (ContextKey::FinalRanking, json!({"ranking": 1, "summary": "later"})),
        ]);
        assert_eq!(record.get_str("ranking_summary"), Some("earlier"));
    }

    #[test]
    fn test_ranking_summary_uses_final_ranking_summary_even_if_profile_has_one() {
        let record = merge(vec![
            (ContextKey::StructuredProfile, json!({"summary": "10 years welding"})),
            (ContextKey::FinalRanking, json!({"ranking": 3, "summary": "good fit"})),
        ]);

        assert_eq!(record.get_str("summary"), Some("10 years welding"));
        assert_eq!(record.get_str("ranking_summary"), Some("good fit"));
    }

    #[test]
    fn test_only_linkedin_profile_is_taken_from_enrichment() {
        let record = merge(vec![
            (ContextKey::StructuredProfile, json!({"linkedin_profile": "old"})),
            (
                ContextKey::EnrichedProfile,
                json!({"linkedin_profile": "https://linkedin.com/in/ada", "headline": "Welder"}),
            ),
        ]);

        assert_eq!(record.get_str("linkedin_profile"), Some("https://linkedin.com/in/ada"));
        assert!(!record.contains("headline"));
    }

    #[test]
    fn test_enrichment_without_linkedin_profile_adds_nothing() {
        let record = merge(vec![(ContextKey::EnrichedProfile, json!({}))]);
        assert!(!record.contains("linkedin_profile"));
        assert!(record.is_empty());
    }

    #[test]
    fn test_flagged_issues_are_joined() {
        let record = merge(vec![(
            ContextKey::FlaggedGaps,
            json!({"flagged_issues": [
                {"issue": "cert_expired", "severity": "high"},
                {"issue": "gap", "description": "6 months", "severity": "low", "resolution": "ask"}
            ]}),
        )]);

        assert_eq!(record.get_str("flagged_issue"), Some("cert_expired,gap"));
        assert_eq!(record.get_str("flagged_issue_severity"), Some("high,low"));
        assert_eq!(record.get_str("flagged_issue_description"), Some(",6 months"));
        assert_eq!(record.get_str("flagged_issue_resolution"), Some(",ask"));
        assert!(!record.contains("flagged_issues"));
    }

    #[test]
    fn test_single_flagged_issue_renders_missing_subfields_as_empty() {
        let record = merge(vec![(
            ContextKey::FlaggedGaps,
            json!({"flagged_issues": [{"issue": "cert_expired", "severity": "high"}]}),
        )]);

        assert_eq!(record.get_str("flagged_issue"), Some("cert_expired"));
        assert_eq!(record.get_str("flagged_issue_severity"), Some("high"));
        assert_eq!(record.get_str("flagged_issue_description"), Some(""));
        assert_eq!(record.get_str("flagged_issue_resolution"), Some(""));
    }

    #[test]
    fn test_empty_flagged_issues_adds_nothing() {
        let record = merge(vec![(ContextKey::FlaggedGaps, json!({"flagged_issues": []}))]);
        assert!(record.is_empty());
    }

    #[test]
    fn test_flagged_fields_overwrite_earlier_values() {
        let record = merge(vec![
            (ContextKey::AttributeScores, json!({"flagged_issue": "stale"})),
            (ContextKey::FlaggedGaps, json!({"flagged_issues": [{"issue": "fresh"}]})),
        ]);
        assert_eq!(record.get_str("flagged_issue"), Some("fresh"));
    }

    #[test]
    fn test_non_object_inputs_are_anomalies() {
        let outcome = MergeEngine::new().merge_with_report(&snapshot(vec![
            (ContextKey::StructuredProfile, json!("```json {broken")),
            (ContextKey::AttributeScores, json!({"skill_match": 8})),
            (ContextKey::SemanticMatch, json!([1, 2])),
        ]));

        assert_eq!(outcome.record.field_names(), vec!["skill_match"]);
        assert_eq!(outcome.anomalies.len(), 2);
        assert_eq!(outcome.anomalies[0].source, ContextKey::StructuredProfile);
        assert_eq!(outcome.anomalies[1].source, ContextKey::SemanticMatch);
        assert!(outcome.anomalies[1].reason.contains("array"));
    }

    #[test]
    fn test_null_inputs_are_absent_not_anomalies() {
        let outcome = MergeEngine::new().merge_with_report(&snapshot(vec![
            (ContextKey::EnrichedProfile, Value::Null),
            (ContextKey::FlaggedGaps, json!({"flagged_issues": null})),
        ]));

        assert!(outcome.record.is_empty());
        assert!(outcome.anomalies.is_empty());
    }

    #[test]
    fn test_flagged_issues_not_a_list_is_an_anomaly() {
        let outcome = MergeEngine::new().merge_with_report(&snapshot(vec![(
            ContextKey::FlaggedGaps,
            json!({"flagged_issues": "none"}),
        )]));

        assert!(outcome.record.is_empty());
        assert_eq!(outcome.anomalies[0].source, ContextKey::FlaggedGaps);
    }

    #[test]
    fn test_non_merge_keys_are_ignored() {
        let record = merge(vec![
            (ContextKey::ProfilePath, json!("cv.pdf")),
            (ContextKey::JobRequirements, json!({"required_skills": ["TIG"]})),
            (ContextKey::ExtractedText, json!("raw text")),
        ]);
        assert!(record.is_empty());
    }

    #[test]
    fn test_field_set_is_union_of_inputs() {
        let record = merge(vec![
            (ContextKey::StructuredProfile, json!({"name": "Ada", "skills": ["TIG"]})),
            (ContextKey::AttributeScores, json!({"skill_match": 8, "name": "Ada L."})),
            (ContextKey::SemanticMatch, json!({"semantic_score": 77})),
            (ContextKey::InterviewQuestions, json!({"interview_questions": []})),
            (ContextKey::FinalRanking, json!({"ranking": 1, "summary": "top"})),
            (ContextKey::EnrichedProfile, json!({"linkedin_profile": "not found"})),
            (ContextKey::FlaggedGaps, json!({"flagged_issues": [{"issue": "none"}]})),
        ]);

        assert_eq!(
            record.field_names(),
            vec![
                "flagged_issue",
                "flagged_issue_description",
                "flagged_issue_resolution",
                "flagged_issue_severity",
                "interview_questions",
                "linkedin_profile",
                "name",
                "ranking",
                "ranking_summary",
                "semantic_score",
                "skill_match",
                "skills",
                "summary",
            ]
        );
        assert_eq!(record.get_str("name"), Some("Ada L."));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let snap = snapshot(vec![
            (ContextKey::StructuredProfile, json!({"name": "Ada", "skills": ["A", "B"]})),
            (ContextKey::FinalRanking, json!({"ranking": 1, "summary": "s", "z": [1]})),
            (ContextKey::FlaggedGaps, json!({"flagged_issues": [{"issue": "x"}]})),
        ]);
        let engine = MergeEngine::new();

        let first = serde_json::to_string(&engine.merge(&snap)).unwrap();
        let second = serde_json::to_string(&engine.merge(&snap)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_does_not_mutate_snapshot() {
        let snap = snapshot(vec![(
            ContextKey::InterviewQuestions,
            json!({"interview_questions": [{"question": "q", "rationale": "r"}]}),
        )]);
        let _ = MergeEngine::new().merge(&snap);

        assert_eq!(
            snap.get(ContextKey::InterviewQuestions),
            Some(&json!({"interview_questions": [{"question": "q", "rationale": "r"}]}))
        );
    }

    #[test]
    fn test_custom_separators() {
        let engine = MergeEngine::new()
            .with_skills_separator("|")
            .with_issue_separator("; ");
        let record = engine.merge(&snapshot(vec![
            (ContextKey::StructuredProfile, json!({"skills": ["a", "b"]})),
            (ContextKey::FlaggedGaps, json!({"flagged_issues": [{"issue": "x"}, {"issue": "y"}]})),
        ]));

        assert_eq!(record.get_str("skills"), Some("a|b"));
        assert_eq!(record.get_str("flagged_issue"), Some("x; y"));
    }
}
