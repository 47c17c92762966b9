//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies the handlers' failure modes into a single
//! enum that converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur while serving a read-only observer request.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested player slot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Serialization(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {err}"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
