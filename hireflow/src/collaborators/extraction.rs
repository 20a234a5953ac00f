//! Document text extraction.
//!
//! Resumes arrive as PDF, DOCX or plain text. Parsing is CPU-bound and runs on
//! the blocking pool so it never stalls the scheduler.

use crate::context::ContextKey;
use crate::errors::{ExecutorError, ExtractionError};
use crate::stages::{TaskExecutor, TaskInputs};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Turns a document path into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts the text of the document at `path`.
    async fn extract(&self, path: &str) -> Result<String, ExtractionError>;
}

/// The document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word processing document.
    Docx,
    /// UTF-8 (or close enough) plain text.
    Text,
}

impl DocumentKind {
    /// Detects the kind from a file or object name's extension.
    pub fn from_name(name: &str) -> Result<Self, ExtractionError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "text" | "md" => Ok(Self::Text),
            _ => Err(ExtractionError::UnsupportedFileType { extension }),
        }
    }
}

/// Extracts text from raw document bytes.
///
/// `name` is only used in error messages.
pub fn extract_bytes(kind: DocumentKind, name: &str, data: &[u8]) -> Result<String, ExtractionError> {
    match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(data)
            .map_err(|e| unreadable(name, e.to_string())),
        DocumentKind::Docx => docx_text(name, data),
        DocumentKind::Text => Ok(String::from_utf8_lossy(data).into_owned()),
    }
}

fn docx_text(name: &str, data: &[u8]) -> Result<String, ExtractionError> {
    let doc = docx_rs::read_docx(data).map_err(|e| unreadable(name, e.to_string()))?;

    let mut text = String::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }
    Ok(text)
}

fn unreadable(path: &str, reason: impl Into<String>) -> ExtractionError {
    ExtractionError::Unreadable {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Reads documents from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, path: &str) -> Result<String, ExtractionError> {
        if path.trim().is_empty() {
            return Err(ExtractionError::InvalidPath);
        }
        let kind = DocumentKind::from_name(path)?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| unreadable(path, e.to_string()))?;

        let name = path.to_string();
        let bytes = data.len();
        let text = tokio::task::spawn_blocking(move || extract_bytes(kind, &name, &data))
            .await
            .map_err(|e| unreadable(path, format!("extraction task failed: {e}")))??;

        debug!(path, ?kind, bytes, chars = text.len(), "document extracted");
        Ok(text)
    }
}

/// Task executor that maps `profile_path` to the document's text.
pub struct ExtractionExecutor {
    extractor: Arc<dyn TextExtractor>,
}

impl ExtractionExecutor {
    /// Creates an executor backed by `extractor`.
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl TaskExecutor for ExtractionExecutor {
    fn tools(&self) -> Vec<&str> {
        vec!["extract_text"]
    }

    async fn execute(&self, inputs: &TaskInputs) -> Result<serde_json::Value, ExecutorError> {
        let path = inputs
            .get_str(ContextKey::ProfilePath)
            .ok_or(ExecutorError::MissingInput(ContextKey::ProfilePath))?;
        let text = self.extractor.extract(path).await?;
        Ok(serde_json::Value::String(text))
    }
}
