//! Error types for the channel server.
//!
//! [`ChannelError`] unifies handler failures into a single enum that
//! converts into an Axum HTTP response with a JSON `{error, status}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use showcase_core::presentation::PresentationError;

/// Errors that can occur in the channel's HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The request was well-formed but its content was rejected.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No presentation is attached, or its runner has stopped.
    #[error("presentation unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PresentationError> for ChannelError {
    fn from(err: PresentationError) -> Self {
        match err {
            PresentationError::Closed => Self::Unavailable(err.to_string()),
            PresentationError::Sequencer { .. } => Self::BadRequest(err.to_string()),
            PresentationError::Catalog { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ChannelError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
