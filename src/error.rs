//! Request-level error taxonomy and its JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::completion::CompletionError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required request field is missing or empty.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
        example: Option<Value>,
    },

    /// File type or size rejected by the upload allow-list.
    #[error("{0}")]
    UnsupportedInput(String),

    /// The completion API call failed and the caller chose to surface it.
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: CompletionError,
    },

    #[error("{context}: {message}")]
    Internal {
        context: &'static str,
        message: String,
    },
}

impl AppError {
    pub fn missing_field(field: &'static str, example: Option<Value>) -> Self {
        Self::Validation {
            field,
            message: format!("No {field} provided"),
            example,
        }
    }

    /// The field is present but has the wrong JSON type.
    pub fn non_string_field(field: &'static str, example: Option<Value>) -> Self {
        Self::Validation {
            field,
            message: format!("{field} must be a string"),
            example,
        }
    }

    pub fn internal(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            context,
            message: err.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::UnsupportedInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::Validation {
                field,
                message,
                example,
            } => {
                let mut body = json!({
                    "success": false,
                    "error": message,
                    "field": field,
                });
                if let Some(example) = example {
                    body["example"] = example.clone();
                }
                body
            }
            Self::UnsupportedInput(message) => json!({
                "success": false,
                "error": message,
            }),
            Self::Upstream { context, source } => json!({
                "success": false,
                "error": context,
                "message": source.to_string(),
            }),
            Self::Internal { context, message } => json!({
                "success": false,
                "error": context,
                "message": message,
            }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
