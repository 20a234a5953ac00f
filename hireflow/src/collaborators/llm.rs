//! Language-model task execution.
//!
//! A model task renders a fixed instruction template with the stage's inputs,
//! sends it to a [`ModelClient`], and parses the answer as one JSON value.

use crate::context::ContextKey;
use crate::errors::ExecutorError;
use crate::stages::{TaskExecutor, TaskInputs};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::debug;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap_or_else(|e| unreachable!("placeholder pattern: {e}"))
});

/// Text rendered in place of an absent input.
pub const ABSENT_INPUT: &str = "(not provided)";

/// One call to a language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    /// Id of the task issuing the call.
    pub task: String,
    /// Instruction text.
    pub system: String,
    /// Rendered user prompt.
    pub prompt: String,
}

/// A language model that turns a request into raw text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Name of the model behind the client.
    fn model_name(&self) -> String;

    /// Generates a completion.
    async fn generate(&self, request: &ModelRequest) -> Result<String, ExecutorError>;
}

/// An instruction template with `{{name}}` placeholders for context values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Creates a template.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the placeholder names, in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for captures in PLACEHOLDER.captures_iter(&self.text) {
            let name = captures[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Renders the template.
    ///
    /// Strings are inserted verbatim, other values as pretty JSON. Absent or
    /// unknown names render as [`ABSENT_INPUT`].
    #[must_use]
    pub fn render(&self, inputs: &TaskInputs) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |captures: &regex::Captures<'_>| {
                captures[1]
                    .parse::<ContextKey>()
                    .ok()
                    .and_then(|key| inputs.get(key))
                    .map(|value| match value {
                        serde_json::Value::String(text) => text.clone(),
                        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
                    })
                    .unwrap_or_else(|| ABSENT_INPUT.to_string())
            })
            .into_owned()
    }
}

/// Required top-level fields of a model task's JSON output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSchema {
    fields: Vec<String>,
    required: Vec<String>,
}

impl OutputSchema {
    /// Creates a schema describing `fields`, none of them required.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            required: Vec::new(),
        }
    }

    /// Marks a field as required.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field.clone());
        }
        if !self.required.contains(&field) {
            self.required.push(field);
        }
        self
    }

    /// Returns all described fields.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the required fields.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Checks a parsed output. Required fields must be present and non-null.
    pub fn check(&self, value: &serde_json::Value) -> Result<(), ExecutorError> {
        let Some(object) = value.as_object() else {
            return Err(ExecutorError::MalformedOutput(format!(
                "expected a JSON object, got: {}",
                truncate(&value.to_string(), 120)
            )));
        };
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|field| object.get(field.as_str()).map_or(true, serde_json::Value::is_null))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExecutorError::SchemaMismatch { missing })
        }
    }
}

/// Strips a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    rest.strip_suffix("```").map_or(rest, str::trim_end)
}

/// Parses raw model output into JSON.
pub fn parse_model_output(raw: &str) -> Result<serde_json::Value, ExecutorError> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body)
        .map_err(|e| ExecutorError::MalformedOutput(format!("{e}: {}", truncate(body, 120))))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Task executor that delegates to a language model.
pub struct LlmTaskExecutor {
    task: String,
    instruction: String,
    template: PromptTemplate,
    schema: Option<OutputSchema>,
    model: Arc<dyn ModelClient>,
}

impl LlmTaskExecutor {
    /// Creates an executor for `task`.
    pub fn new(
        task: impl Into<String>,
        instruction: impl Into<String>,
        template: PromptTemplate,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            task: task.into(),
            instruction: instruction.into(),
            template,
            schema: None,
            model,
        }
    }

    /// Validates output against `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Returns the prompt template.
    #[must_use]
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }
}

#[async_trait]
impl TaskExecutor for LlmTaskExecutor {
    async fn execute(&self, inputs: &TaskInputs) -> Result<serde_json::Value, ExecutorError> {
        let request = ModelRequest {
            task: self.task.clone(),
            system: self.instruction.clone(),
            prompt: self.template.render(inputs),
        };

        let start = Instant::now();
        let raw = self.model.generate(&request).await?;
        debug!(
            task = %self.task,
            model = %self.model.model_name(),
            prompt_chars = request.prompt.len(),
            response_chars = raw.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "model call returned"
        );

        let value = parse_model_output(&raw)?;
        if let Some(schema) = &self.schema {
            schema.check(&value)?;
        }
        Ok(value)
    }
}

impl std::fmt::Debug for LlmTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmTaskExecutor")
            .field("task", &self.task)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
