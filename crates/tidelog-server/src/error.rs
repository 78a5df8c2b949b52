//! Server error types and their HTTP mapping

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tidelog_core::{FramingError, PositionError};
use tidelog_engine::EngineError;
use tidelog_session::SessionError;
use tracing::warn;

/// Errors raised by the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a new BadRequest error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status reported for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Engine(e) if e.is_fatal() => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Session(e) if e.is_fatal() => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Engine(EngineError::ResultCountMismatch { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::BadRequest(_)
            | ServerError::Engine(_)
            | ServerError::Session(_)
            | ServerError::Framing(_)
            | ServerError::Position(_)
            | ServerError::Multipart(_) => StatusCode::BAD_REQUEST,
            ServerError::Config(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type alias for server operations
pub type ServerResult<T> = Result<T, ServerError>;
