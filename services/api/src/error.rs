//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `ApiError` for startup and
//! `WebError` for failures reported back to a client.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use photo_story_core::{PortError, WorkflowError};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// An error raised while handling a request. Every variant is reported to the
/// user; none of them ends the session.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("External service failed: {0}")]
    Port(#[from] PortError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// The JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::SessionNotFound(_) | WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Workflow(WorkflowError::UnknownStory(_)) => StatusCode::NOT_FOUND,
            WebError::Workflow(WorkflowError::UnsupportedImage(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            WebError::Workflow(WorkflowError::TooManyImages(_)) => StatusCode::BAD_REQUEST,
            WebError::Workflow(WorkflowError::EmptyOutput(_)) => StatusCode::BAD_GATEWAY,
            WebError::Workflow(_) => StatusCode::CONFLICT,
            WebError::Port(PortError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            WebError::Port(PortError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            WebError::Port(PortError::Unexpected(_)) => StatusCode::BAD_GATEWAY,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
