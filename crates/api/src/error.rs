use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowtrack_core::error::CoreError;
use flowtrack_engine::EngineError;
use flowtrack_store::StoreError;
use flowtrack_tracker::ServiceError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`ServiceError`] for everything the job service reports and adds
/// the request-shape failures axum detects before a handler runs.
/// Implements [`IntoResponse`] to produce consistent `{ "error", "code" }`
/// JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Body or query could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Service(ServiceError::Core(core)) => classify_core(core),
            AppError::Service(ServiceError::Store(err)) => classify_store(err),
            AppError::Service(ServiceError::Engine(err)) => classify_engine(err),
            AppError::Service(ServiceError::ShuttingDown) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SHUTTING_DOWN",
                "The server is shutting down".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Body of the 500 returned when a handler panics.
pub fn panic_body() -> serde_json::Value {
    json!({
        "error": "An internal error occurred",
        "code": "INTERNAL_ERROR",
    })
}

fn classify_core(err: &CoreError) -> Classified {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
    }
}

/// Missing records are 404s; anything else from the store is a 500 whose
/// details (key names included) stay in the log.
fn classify_store(err: &StoreError) -> Classified {
    match err {
        StoreError::NotFound { key } => {
            tracing::debug!(key = %key, "Record not found");
            (StatusCode::NOT_FOUND, "NOT_FOUND", "Record not found".to_string())
        }
        StoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        other => {
            tracing::error!(error = %other, "Record store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "The record store is unavailable".to_string(),
            )
        }
    }
}

/// A 4xx from the engine means it rejected the workflow, which is the
/// caller's problem; everything else is an upstream failure.
fn classify_engine(err: &EngineError) -> Classified {
    match err {
        EngineError::Api { status, body } if (400..500).contains(status) => (
            StatusCode::BAD_REQUEST,
            "ENGINE_REJECTED",
            format!("Workflow engine rejected the request ({status}): {body}"),
        ),
        EngineError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Workflow {what} not found"),
        ),
        other => {
            tracing::error!(error = %other, "Workflow engine error");
            (
                StatusCode::BAD_GATEWAY,
                "ENGINE_ERROR",
                "The workflow engine is unavailable".to_string(),
            )
        }
    }
}
