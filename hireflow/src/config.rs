//! Runtime configuration loaded from environment variables.

use crate::collaborators::{ProfileEnricher, SimulatedEnricher};
use crate::errors::ConfigError;
use crate::observability::LogFormat;
use crate::persistence::{InMemorySink, JsonFileSink, WarehouseSink};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Dataset used when none is configured.
pub const DEFAULT_DATASET: &str = "candidate_cv";
/// Table used when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "welder_profile_v1";
/// Port the HTTP boundary listens on when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Where merged records are written.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Keep rows in memory (development and tests).
    Memory,
    /// Write one JSON file per record into `dir`.
    Json {
        /// Output directory.
        dir: PathBuf,
    },
    /// Stream rows into BigQuery.
    #[serde(rename = "bigquery")]
    BigQuery {
        /// GCP project id.
        project: String,
        /// OAuth access token.
        #[serde(skip_serializing)]
        access_token: String,
    },
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Json { dir } => f.debug_struct("Json").field("dir", dir).finish(),
            Self::BigQuery { project, .. } => f
                .debug_struct("BigQuery")
                .field("project", project)
                .finish_non_exhaustive(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct HireflowConfig {
    /// Model name passed to the model client.
    pub model: String,
    /// Gemini API key.
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    /// Proxycurl API key. Without one, enrichment is simulated.
    #[serde(skip_serializing)]
    pub proxycurl_api_key: Option<String>,
    /// Record sink.
    pub sink: SinkConfig,
    /// Destination table as `dataset.table`.
    pub table: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// HTTP port.
    pub port: u16,
}

impl Default for HireflowConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            gemini_api_key: None,
            proxycurl_api_key: None,
            sink: SinkConfig::Json {
                dir: PathBuf::from("output"),
            },
            table: format!("{DEFAULT_DATASET}.{DEFAULT_TABLE_NAME}"),
            log_format: LogFormat::Text,
            port: DEFAULT_PORT,
        }
    }
}

impl HireflowConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let model = get("HIREFLOW_MODEL")
            .or_else(|| get("MODEL"))
            .unwrap_or(defaults.model);

        let sink = match get("HIREFLOW_SINK").as_deref().unwrap_or("json") {
            "memory" => SinkConfig::Memory,
            "json" => SinkConfig::Json {
                dir: get("HIREFLOW_OUTPUT_DIR").map_or_else(|| PathBuf::from("output"), PathBuf::from),
            },
            "bigquery" => SinkConfig::BigQuery {
                project: get("BIGQUERY_PROJECT")
                    .ok_or_else(|| ConfigError::Missing("BIGQUERY_PROJECT".into()))?,
                access_token: get("BIGQUERY_ACCESS_TOKEN")
                    .ok_or_else(|| ConfigError::Missing("BIGQUERY_ACCESS_TOKEN".into()))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "HIREFLOW_SINK".into(),
                    reason: format!("unknown sink '{other}', expected memory, json or bigquery"),
                })
            }
        };

        let table = format!(
            "{}.{}",
            get("BIGQUERY_DATASET").unwrap_or_else(|| DEFAULT_DATASET.to_string()),
            get("BIGQUERY_TABLE").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
        );

        let log_format = match get("HIREFLOW_LOG_FORMAT") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "HIREFLOW_LOG_FORMAT".into(),
                reason,
            })?,
            None => defaults.log_format,
        };

        let port = match get("PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT".into(),
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        Ok(Self {
            model,
            gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            proxycurl_api_key: get("PROXYCURL_API_KEY"),
            sink,
            table,
            log_format,
            port,
        })
    }

    /// Builds the configured warehouse sink.
    pub fn warehouse_sink(&self) -> Result<Arc<dyn WarehouseSink>, ConfigError> {
        match &self.sink {
            SinkConfig::Memory => Ok(Arc::new(InMemorySink::new())),
            SinkConfig::Json { dir } => Ok(Arc::new(JsonFileSink::new(dir.clone()))),
            #[cfg(feature = "http")]
            SinkConfig::BigQuery {
                project,
                access_token,
            } => {
                let dataset = self.table.split_once('.').map_or(DEFAULT_DATASET, |(d, _)| d);
                let sink = crate::persistence::BigQuerySink::new(project, dataset, access_token)
                    .map_err(|e| http_client_error("HIREFLOW_SINK", &e))?;
                Ok(Arc::new(sink))
            }
            #[cfg(not(feature = "http"))]
            SinkConfig::BigQuery { .. } => Err(ConfigError::Invalid {
                var: "HIREFLOW_SINK".into(),
                reason: "bigquery sink requires the `http` feature".into(),
            }),
        }
    }

    /// Builds the profile enricher: Proxycurl when a key is set, simulated otherwise.
    pub fn profile_enricher(&self) -> Result<Arc<dyn ProfileEnricher>, ConfigError> {
        #[cfg(feature = "http")]
        if let Some(key) = &self.proxycurl_api_key {
            let enricher = crate::collaborators::ProxycurlEnricher::new(key.clone())
                .map_err(|e| http_client_error("PROXYCURL_API_KEY", &e))?;
            return Ok(Arc::new(enricher));
        }
        Ok(Arc::new(SimulatedEnricher))
    }

    /// Builds the production collaborators. Requires a Gemini API key.
    #[cfg(feature = "http")]
    pub fn collaborators(&self) -> Result<crate::collaborators::Collaborators, ConfigError> {
        use crate::collaborators::{Collaborators, DocumentExtractor, GeminiClient};

        let key = self
            .gemini_api_key
            .clone()
            .ok_or_else(|| ConfigError::Missing("GEMINI_API_KEY".into()))?;
        let model = GeminiClient::new(key, self.model.clone())
            .map_err(|e| http_client_error("GEMINI_API_KEY", &e))?;

        Ok(Collaborators::new(
            Arc::new(DocumentExtractor::new()),
            Arc::new(model),
            self.profile_enricher()?,
        ))
    }
}

#[cfg(feature = "http")]
fn http_client_error(var: &str, err: &reqwest::Error) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: format!("cannot build HTTP client: {err}"),
    }
}

impl std::fmt::Debug for HireflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HireflowConfig")
            .field("model", &self.model)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("proxycurl_api_key", &self.proxycurl_api_key.as_ref().map(|_| "<redacted>"))
            .field("sink", &self.sink)
            .field("table", &self.table)
            .field("log_format", &self.log_format)
            .field("port", &self.port)
            .finish()
    }
}
