// ABOUTME: Maps journal errors onto HTTP responses.
// ABOUTME: Validation is 400, NotFound is 404, backend and internal failures are 500 with detail hidden outside development.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use daybook_core::JournalError;
use serde_json::json;

/// An error response: status, client-facing message, and optional detail.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    /// Translate a store error. `failure` is the message used for 500s.
    pub fn from_journal(err: JournalError, failure: &str, expose_detail: bool) -> Self {
        match err {
            JournalError::Validation(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
                detail: None,
            },
            JournalError::NotFound { .. } => Self {
                status: StatusCode::NOT_FOUND,
                message: "Entry not found".to_string(),
                detail: None,
            },
            err @ (JournalError::BackendUnavailable(_) | JournalError::Internal(_)) => {
                tracing::error!(error = %err, "{}", failure);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: failure.to_string(),
                    detail: expose_detail.then(|| err.to_string()),
                }
            }
        }
    }

    /// A body that could not be read as JSON.
    pub fn from_rejection(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "rejected request body");
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("Invalid request body: {}", rejection.body_text()),
            detail: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.detail {
            Some(detail) => json!({ "error": self.message, "message": detail }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
