// plantcare-server/src/error.rs
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plantcare_core::{CreateRecordError, StoreError, ValidationError};
use serde_json::json;
use tracing::error;

const STORE_FAILURE_DETAIL: &str = "Error al acceder a la base de datos";

/// Error returned by the HTTP handlers, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or invalid caller input. The message is shown to the caller.
    BadRequest(String),
    /// The addressed record does not exist.
    NotFound(&'static str),
    /// Downstream failure. Only a generic message leaves the server.
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.to_string()),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail.to_string()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Store operation failed");
        ApiError::Internal(STORE_FAILURE_DETAIL)
    }
}

impl From<CreateRecordError> for ApiError {
    fn from(e: CreateRecordError) -> Self {
        match e {
            CreateRecordError::Validation(v) => v.into(),
            CreateRecordError::Store(s) => s.into(),
        }
    }
}
