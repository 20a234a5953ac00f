use hireflow::pipeline::PipelineDriver;
use std::sync::Arc;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Runs one evaluation per request. Runs share no context.
    pub driver: Arc<PipelineDriver>,
    /// Model name reported by the health check.
    pub model: String,
}

impl AppState {
    pub fn new(driver: PipelineDriver, model: impl Into<String>) -> Self {
        Self {
            driver: Arc::new(driver),
            model: model.into(),
        }
    }
}
