//! HTTP error responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use fable_core::{Error, StatusClass};

/// Error body: `{"detail": "<message>"}`
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// An error that converts into an axum response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Request body failed to parse or validate
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, detail)
    }

    /// Map `err` to a response, prefixing unclassified server faults with
    /// `"<operation> failed: "`.
    ///
    /// Backend initialization and generation failures already carry their
    /// own wording and are passed through.
    pub fn with_operation(err: Error, operation: &str) -> Self {
        let worded = matches!(err, Error::Initialization { .. } | Error::GenerationFailed(_));
        if !worded && err.status_class() == StatusClass::ServerError {
            return Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} failed: {}", operation, err),
            );
        }
        err.into()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err.status_class() {
            StatusClass::ClientError => StatusCode::BAD_REQUEST,
            StatusClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            StatusClass::NotFound => StatusCode::NOT_FOUND,
            StatusClass::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "request failed");
        } else {
            warn!(status = %self.status, detail = %self.detail, "request rejected");
        }

        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}
