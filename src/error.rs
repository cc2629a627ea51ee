//! HTTP error responses.
//!
//! Used by the JSON endpoints and for template failures. HTML handlers turn
//! store errors into on-page messages instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::store::StoreError;

/// Error returned by handlers that answer with JSON.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    /// Message safe to show to users
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    Internal,
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    /// Internal failure. Details are logged, the generic message is shown.
    pub fn internal(internal_details: impl Into<String>) -> Self {
        let details = internal_details.into();
        error!(error = %details, "Internal error occurred");
        Self {
            kind: ErrorKind::Internal,
            message: "Error interno del servidor".into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Store failures on JSON endpoints are reported as 500 with the store's
/// own description, so clients can tell an outage from an empty list.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "Store error on JSON endpoint");
        Self {
            kind: ErrorKind::Internal,
            message: err.to_string(),
        }
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        let mut details = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            details.push_str(": ");
            details.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::internal(details)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: ErrorKind,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message.clone(),
            kind: self.kind,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {}
