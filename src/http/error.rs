//! # HTTP Errors
//!
//! Maps store outcomes to status codes and `{"error": "..."}` bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::error::{ErrorKind, TodoError};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// The route a store call was made for. Picks the client-facing wording of
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Reported for store-side failures in place of the cause.
    #[must_use]
    pub const fn failure(self) -> &'static str {
        match self {
            Self::List => "could not list todos",
            Self::Get => "could not fetch todo",
            Self::Create => "could not create todo",
            Self::Update => "could not update todo",
            Self::Delete => "could not delete todo",
        }
    }

    /// Reported for a missing or blank title.
    #[must_use]
    pub const fn blank_title(self) -> &'static str {
        match self {
            Self::Create => "title is required",
            _ => "title cannot be empty",
        }
    }
}

/// An error ready to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "todo not found")
    }

    /// Translate a store error raised while serving `operation`.
    ///
    /// Store-side failures are logged here with their cause and reported to
    /// the client only as [`Operation::failure`].
    #[must_use]
    pub fn from_store(err: &TodoError, operation: Operation) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::not_found(),
            ErrorKind::Validation => Self::bad_request(validation_message(err, operation)),
            ErrorKind::Store => {
                let failure = operation.failure();
                error!(error = %err, "{failure}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, failure)
            }
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn validation_message(err: &TodoError, operation: Operation) -> String {
    match err {
        TodoError::Validation { field: "title", .. } => operation.blank_title().to_string(),
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
