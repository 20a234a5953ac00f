use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hireflow::errors::HireflowError;
use hireflow::pipeline::RunFailure;
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, ApiError>`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Run(#[from] RunFailure),
}

/// Status code for a failed run.
pub fn status_for(error: &HireflowError) -> StatusCode {
    match error {
        HireflowError::Input(_) => StatusCode::BAD_REQUEST,
        HireflowError::StageExecution(_) | HireflowError::Persist(_) => StatusCode::BAD_GATEWAY,
        HireflowError::Validation(_) | HireflowError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidBody(message) => {
                let body = Json(json!({
                    "error": {
                        "kind": "input_error",
                        "message": message
                    }
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            Self::Run(failure) => {
                let status = status_for(&failure.error);
                if status.is_server_error() {
                    tracing::error!(run_id = %failure.run_id, error = %failure.error, "run failed");
                }
                (status, Json(failure.to_envelope())).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireflow::errors::{InputError, PersistError, RowError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&HireflowError::from(InputError::MissingProfilePath)),
            StatusCode::BAD_REQUEST
        );
        let rejected = PersistError::Rejected {
            table: "t".into(),
            errors: vec![RowError::new(0, "invalid", "bad row")],
        };
        assert_eq!(status_for(&HireflowError::from(rejected)), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&HireflowError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
