//! External profile enrichment (LinkedIn).

use crate::context::ContextKey;
use crate::errors::ExecutorError;
use crate::stages::{TaskExecutor, TaskInputs};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Marker stored when the profile has no LinkedIn URL.
pub const NOT_FOUND: &str = "not found";

/// Looks up extra data for a public profile URL.
#[async_trait]
pub trait ProfileEnricher: Send + Sync {
    /// Enricher name for logging.
    fn name(&self) -> &str;

    /// Fetches enrichment data for `profile_url`.
    async fn enrich(&self, profile_url: &str) -> Result<Value, ExecutorError>;
}

/// Enricher used when no API key is configured. Makes no network calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedEnricher;

#[async_trait]
impl ProfileEnricher for SimulatedEnricher {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn enrich(&self, _profile_url: &str) -> Result<Value, ExecutorError> {
        Ok(json!({"info": "LinkedIn fetch simulated. API call not implemented."}))
    }
}

#[cfg(feature = "http")]
pub use proxycurl::ProxycurlEnricher;

#[cfg(feature = "http")]
mod proxycurl {
    use super::ProfileEnricher;
    use crate::errors::ExecutorError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;

    const DEFAULT_ENDPOINT: &str = "https://nubela.co/proxycurl/api/v2/linkedin";

    /// Enricher backed by the Proxycurl LinkedIn API.
    #[derive(Clone)]
    pub struct ProxycurlEnricher {
        http: reqwest::Client,
        api_key: String,
        endpoint: String,
    }

    impl ProxycurlEnricher {
        /// Creates an enricher using `api_key`.
        pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?;
            Ok(Self {
                http,
                api_key: api_key.into(),
                endpoint: DEFAULT_ENDPOINT.to_string(),
            })
        }

        /// Overrides the API endpoint.
        #[must_use]
        pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
            self.endpoint = endpoint.into();
            self
        }
    }

    #[async_trait]
    impl ProfileEnricher for ProxycurlEnricher {
        fn name(&self) -> &str {
            "proxycurl"
        }

        async fn enrich(&self, profile_url: &str) -> Result<Value, ExecutorError> {
            let response = self
                .http
                .get(&self.endpoint)
                .bearer_auth(&self.api_key)
                .query(&[("linkedin_profile_url", profile_url)])
                .send()
                .await
                .map_err(|e| ExecutorError::Unavailable(format!("Exception during LinkedIn fetch: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ExecutorError::Unavailable(format!(
                    "LinkedIn API error: {} {body}",
                    status.as_u16()
                )));
            }
            response
                .json()
                .await
                .map_err(|e| ExecutorError::MalformedOutput(format!("LinkedIn response: {e}")))
        }
    }

    impl std::fmt::Debug for ProxycurlEnricher {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ProxycurlEnricher")
                .field("endpoint", &self.endpoint)
                .finish_non_exhaustive()
        }
    }
}

/// Reads the candidate's LinkedIn URL from a structured profile.
#[must_use]
pub fn linkedin_url(profile: &Value) -> Option<&str> {
    ["linkedin", "linkedin_url"]
        .iter()
        .filter_map(|field| profile.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|url| !url.is_empty())
}

/// Task executor for the enrichment stage.
///
/// Never fails: a missing URL or an enricher error produce marker objects.
pub struct EnrichmentExecutor {
    enricher: Arc<dyn ProfileEnricher>,
}

impl EnrichmentExecutor {
    /// Creates an executor backed by `enricher`.
    pub fn new(enricher: Arc<dyn ProfileEnricher>) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl TaskExecutor for EnrichmentExecutor {
    fn tools(&self) -> Vec<&str> {
        vec!["fetch_linkedin_profile"]
    }

    async fn execute(&self, inputs: &TaskInputs) -> Result<Value, ExecutorError> {
        let Some(url) = inputs
            .get(ContextKey::StructuredProfile)
            .and_then(linkedin_url)
        else {
            debug!(enricher = self.enricher.name(), "no LinkedIn URL in profile");
            return Ok(json!({"linkedin_profile": NOT_FOUND}));
        };

        match self.enricher.enrich(url).await {
            Ok(Value::Object(mut fields)) => {
                fields.insert("linkedin_profile".to_string(), json!(url));
                Ok(Value::Object(fields))
            }
            Ok(other) => Ok(json!({"linkedin_profile": url, "data": other})),
            Err(e) => {
                warn!(enricher = self.enricher.name(), error = %e, "profile enrichment failed");
                Ok(json!({"linkedin_profile": url, "error": e.to_string()}))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FailingEnricher;

    #[async_trait]
    impl ProfileEnricher for FailingEnricher {
        fn name(&self) -> &str {
            "failing"
        }

        async fn enrich(&self, _profile_url: &str) -> Result<Value, ExecutorError> {
            Err(ExecutorError::Unavailable("LinkedIn API error: 429".into()))
        }
    }

    fn profile_inputs(profile: Value) -> TaskInputs {
        TaskInputs::new([(ContextKey::StructuredProfile, profile)])
    }

    #[test]
    fn test_linkedin_url_lookup() {
        assert_eq!(linkedin_url(&json!({"linkedin": " https://l.in/a "})), Some("https://l.in/a"));
        assert_eq!(linkedin_url(&json!({"linkedin": "", "linkedin_url": "u"})), Some("u"));
        assert_eq!(linkedin_url(&json!({"linkedin": null})), None);
        assert_eq!(linkedin_url(&json!("not an object")), None);
    }

    #[tokio::test]
    async fn test_missing_url_gives_not_found_marker() {
        let executor = EnrichmentExecutor::new(Arc::new(SimulatedEnricher));

        let value = executor.execute(&profile_inputs(json!({"name": "Jane"}))).await.unwrap();

        assert_eq!(value, json!({"linkedin_profile": "not found"}));
    }

    #[tokio::test]
    async fn test_missing_profile_gives_not_found_marker() {
        let executor = EnrichmentExecutor::new(Arc::new(SimulatedEnricher));
        let value = executor.execute(&TaskInputs::default()).await.unwrap();
        assert_eq!(value["linkedin_profile"], "not found");
    }

    #[tokio::test]
    async fn test_success_merges_url() {
        let executor = EnrichmentExecutor::new(Arc::new(SimulatedEnricher));

        let value = executor
            .execute(&profile_inputs(json!({"linkedin": "https://linkedin.com/in/jane"})))
            .await
            .unwrap();

        assert_eq!(
            value,
            json!({
                "info": "LinkedIn fetch simulated. API call not implemented.",
                "linkedin_profile": "https://linkedin.com/in/jane"
            })
        );
    }

    #[tokio::test]
    async fn test_enricher_error_becomes_marker() {
        let executor = EnrichmentExecutor::new(Arc::new(FailingEnricher));

        let value = executor
            .execute(&profile_inputs(json!({"linkedin_url": "https://linkedin.com/in/jane"})))
            .await
            .unwrap();

        assert_eq!(value["linkedin_profile"], "https://linkedin.com/in/jane");
        assert!(value["error"].as_str().unwrap().contains("429"));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_proxycurl_debug_hides_key() {
        let enricher = ProxycurlEnricher::new("pc-secret").unwrap();
        assert!(!format!("{enricher:?}").contains("pc-secret"));
    }
}
