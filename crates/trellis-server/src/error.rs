//! API errors and their mapping onto status codes and the response envelope.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;
use trellis_tasks::TaskError;

use crate::response::error_body;

/// Field name to the messages raised against it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Message for a completion blocked by the transition guard.
pub const PENDING_DEPENDENCIES_MESSAGE: &str =
    "Cannot mark task as completed due to pending dependencies";

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, expired or orphaned bearer token.
    #[error("Unauthenticated.")]
    Unauthenticated,

    /// Request failed field validation.
    #[error("Validation failed")]
    Validation {
        /// Messages per field.
        errors: FieldErrors,
    },

    /// No route matched.
    #[error("Resource not found")]
    RouteNotFound,

    /// Failure reported by the task service.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Runtime failure outside the service (e.g. a panicked blocking task).
    #[error("Internal error: {message}")]
    Internal {
        /// Detail, logged but never returned to the client.
        message: String,
    },
}

impl ApiError {
    /// A validation error on a single field.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        let _ = errors.insert(name.to_string(), vec![message.into()]);
        Self::Validation { errors }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Task(err) => match err {
                TaskError::NotFound { .. } => StatusCode::NOT_FOUND,
                TaskError::Validation(_) | TaskError::CircularDependency { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                TaskError::Authorization { .. } => StatusCode::FORBIDDEN,
                TaskError::Transition { .. } => StatusCode::BAD_REQUEST,
                TaskError::Sqlite(_) | TaskError::Pool(_) | TaskError::Migration { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message and detail. Internal details are replaced.
    fn public_parts(&self) -> (String, Option<Value>) {
        match self {
            Self::Unauthenticated => (self.to_string(), None),
            Self::Validation { errors } => ("Validation failed".into(), Some(json!(errors))),
            Self::RouteNotFound => ("Resource not found".into(), Some(json!("Resource not found."))),
            Self::Task(err) => match err {
                TaskError::NotFound { .. } => {
                    ("Resource not found".into(), Some(json!(err.to_string())))
                }
                TaskError::Validation(message) => (
                    "Validation failed".into(),
                    Some(json!({ "body": [message] })),
                ),
                TaskError::CircularDependency { .. } => (
                    "Validation failed".into(),
                    Some(json!({ "dependency_ids": [err.to_string()] })),
                ),
                TaskError::Authorization { .. } => ("This action is unauthorized.".into(), None),
                TaskError::Transition { pending, .. } => (
                    PENDING_DEPENDENCIES_MESSAGE.into(),
                    Some(json!({ "pending_dependencies": pending })),
                ),
                TaskError::Sqlite(_) | TaskError::Pool(_) | TaskError::Migration { .. } => {
                    internal_parts()
                }
            },
            Self::Internal { .. } => internal_parts(),
        }
    }
}

fn internal_parts() -> (String, Option<Value>) {
    ("Something went wrong.".into(), Some(json!("Internal error")))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let (message, errors) = self.public_parts();
        (status, Json(error_body(message, errors))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::field("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::field("query", rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal {
            message: format!("blocking task failed: {err}"),
        }
    }
}
