//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{ActivityError, SagaError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga execution error.
    Saga(SagaError),
    /// Direct store access failed.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        SagaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SagaError::StepFailed { source, .. } => activity_error_status(source),
        SagaError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };

    let failed_compensations: Vec<_> = err.compensation_failures().map(|c| c.step).collect();
    if !failed_compensations.is_empty() {
        tracing::error!(
            error = %err,
            compensations = ?failed_compensations,
            "order left partially compensated"
        );
    }

    let body = serde_json::json!({
        "error": err.to_string(),
        "saga_state": err.final_state().as_str(),
        "failed_compensations": failed_compensations,
    });
    (status, body)
}

fn activity_error_status(err: &ActivityError) -> StatusCode {
    match err {
        ActivityError::BusinessRule(_) => StatusCode::CONFLICT,
        ActivityError::NotFound(_) => StatusCode::NOT_FOUND,
        ActivityError::ExternalService { retryable: false, .. } => StatusCode::CONFLICT,
        ActivityError::Connection(_)
        | ActivityError::Transaction(_)
        | ActivityError::Timeout(_)
        | ActivityError::ExternalService { retryable: true, .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ActivityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        err if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error_body(err.to_string()))
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
