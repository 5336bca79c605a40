//! Conversion of engine errors into `{ "error": ..., "details": ... }` responses.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Wrapper for converting [`Error`] and body rejections into HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    Engine(Error),
    Body(JsonRejection),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

/// Status code for an error class.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Eligibility => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Consistency => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Store | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Body(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Invalid request body".to_string(),
                    details: Some(rejection.body_text()),
                },
            ),
            Self::Engine(err) => {
                let status = status_for(err.kind());
                let body = match err.kind() {
                    ErrorKind::Store | ErrorKind::Internal => {
                        error!(error = %err, "Request failed");
                        ErrorResponse {
                            error: "Internal server error".to_string(),
                            details: Some(err.to_string()),
                        }
                    }
                    ErrorKind::Eligibility => ErrorResponse {
                        error: "Not eligible".to_string(),
                        details: Some(err.to_string()),
                    },
                    _ => ErrorResponse {
                        error: err.to_string(),
                        details: None,
                    },
                };
                (status, body)
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type returned by handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
