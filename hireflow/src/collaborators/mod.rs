//! External collaborators called by task stages.
//!
//! Every collaborator sits behind a trait so the pipeline can run against
//! real services, local stand-ins, or test doubles:
//!
//! - [`TextExtractor`]: document path to plain text
//! - [`ModelClient`]: instruction and prompt to raw model output
//! - [`ProfileEnricher`]: profile URL to enrichment JSON
//! - [`ObjectStore`]: blob storage scanned by [`BucketScanner`]

pub mod bucket;
pub mod enrichment;
pub mod extraction;
pub mod llm;

#[cfg(feature = "http")]
pub mod gemini;

pub use bucket::{
    BucketScanner, InMemoryObjectStore, LocalObjectStore, ObjectInfo, ObjectStore,
    RelocationFailure, ScanReport, DEFAULT_ARCHIVE_PREFIX,
};
#[cfg(feature = "http")]
pub use enrichment::ProxycurlEnricher;
pub use enrichment::{EnrichmentExecutor, ProfileEnricher, SimulatedEnricher};
pub use extraction::{DocumentExtractor, DocumentKind, ExtractionExecutor, TextExtractor};
#[cfg(feature = "http")]
pub use gemini::GeminiClient;
pub use llm::{LlmTaskExecutor, ModelClient, ModelRequest, OutputSchema, PromptTemplate};

use std::sync::Arc;

/// The collaborators one pipeline instance is wired with.
#[derive(Clone)]
pub struct Collaborators {
    /// Document text extraction.
    pub extractor: Arc<dyn TextExtractor>,
    /// Language model used by every model task.
    pub model: Arc<dyn ModelClient>,
    /// Profile enrichment.
    pub enricher: Arc<dyn ProfileEnricher>,
}

impl Collaborators {
    /// Bundles the three collaborators.
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        model: Arc<dyn ModelClient>,
        enricher: Arc<dyn ProfileEnricher>,
    ) -> Self {
        Self {
            extractor,
            model,
            enricher,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("model", &self.model.model_name())
            .field("enricher", &self.enricher.name())
            .finish_non_exhaustive()
    }
}
