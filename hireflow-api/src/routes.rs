use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use hireflow::pipeline::EvaluationRequest;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/multi_agent_call", post(evaluate_handler))
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hireflow-api",
        "version": env!("CARGO_PKG_VERSION"),
        "pipeline": state.driver.pipeline().name(),
        "model": state.model
    }))
}

/// POST /multi_agent_call
/// Runs one evaluation and returns the merged record.
async fn evaluate_handler(
    State(state): State<AppState>,
    body: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let report = state.driver.run(request).await?;
    tracing::info!(
        run_id = %report.run_id,
        fields = report.record.len(),
        duration_ms = report.duration_ms,
        "evaluation served"
    );
    Ok(Json(report.record.to_row()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use hireflow::collaborators::{Collaborators, SimulatedEnricher};
    use hireflow::errors::RowError;
    use hireflow::persistence::{InMemorySink, RecordPersister};
    use hireflow::pipeline::{candidate_evaluation_pipeline, PipelineDriver};
    use hireflow::testing::fixtures;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(sink: InMemorySink) -> Router {
        let collaborators = Collaborators::new(
            Arc::new(fixtures::resume_extractor()),
            Arc::new(fixtures::canned_model()),
            Arc::new(SimulatedEnricher),
        );
        let pipeline = candidate_evaluation_pipeline(&collaborators).unwrap();
        let driver = PipelineDriver::new(pipeline, RecordPersister::new(Arc::new(sink)));
        build_router(AppState::new(driver, "canned"))
    }

    fn resume_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", fixtures::RESUME_TEXT).unwrap();
        file
    }

    fn post_json(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/multi_agent_call")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app(InMemorySink::new()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "canned");
    }

    #[tokio::test]
    async fn test_evaluation_returns_record() {
        let file = resume_file();
        let req = post_json(&json!({
            "profile_path": file.path().to_string_lossy(),
            "job_description": fixtures::job_description()
        }));

        let response = app(InMemorySink::new()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Jane Doe");
        assert_eq!(body["skills"], "TIG, MIG, Blueprint Reading");
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let req = post_json(&json!({
            "profile_path": "/no/such/resume.pdf",
            "job_description": {}
        }));

        let response = app(InMemorySink::new()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "input_error");
        assert!(body["run_id"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let req = post_json(&json!({"job_description": {}}));

        let response = app(InMemorySink::new()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "input_error");
    }

    #[tokio::test]
    async fn test_persist_rejection_is_bad_gateway_with_record() {
        let file = resume_file();
        let sink = InMemorySink::rejecting(vec![RowError::new(0, "invalid", "schema mismatch")]);
        let req = post_json(&json!({
            "profile_path": file.path().to_string_lossy(),
            "job_description": fixtures::job_description()
        }));

        let response = app(sink).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "persist_error");
        assert_eq!(body["record"]["name"], "Jane Doe");
    }
}
