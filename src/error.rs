//! Error types for the real-time transport and the relay gateway.
//!
//! [`RealtimeError`] is the central error type. Each variant carries a
//! numeric code and maps to an HTTP status so the REST surface can render it
//! as a structured JSON body. Inbound frame failures use the narrower
//! [`DecodeError`], and transport failures use [`TransportError`]; neither is
//! ever surfaced to listener code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1004,
///     "message": "invalid request: recipientId must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A single inbound frame could not be decoded into an envelope.
///
/// Covers invalid JSON, non-object payloads, and a missing or non-string
/// `type` field.
#[derive(Debug, thiserror::Error)]
#[error("malformed frame: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Failure reported by a transport while opening or writing.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("transport open failed: {0}")]
    Open(String),

    /// The connection is gone; the frame was not written.
    #[error("transport closed")]
    Closed,
}

/// Library-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status               |
/// |-----------|------------|---------------------------|
/// | 1000–1999 | Validation | 400 Bad Request           |
/// | 3000–3999 | Server     | 500 / 502                 |
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// No user identity is available; an unauthenticated channel is refused.
    #[error("missing user identity")]
    MissingIdentity,

    /// The endpoint origin could not be turned into a WebSocket URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An envelope could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client's driver task has stopped.
    #[error("realtime client is shut down")]
    ClientClosed,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MissingIdentity => 1001,
            Self::InvalidEndpoint(_) => 1002,
            Self::Decode(_) => 1003,
            Self::InvalidRequest(_) => 1004,
            Self::Config(_) => 1005,
            Self::Internal(_) => 3000,
            Self::Transport(_) => 3001,
            Self::ClientClosed => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::InvalidEndpoint(_)
            | Self::Decode(_)
            | Self::InvalidRequest(_)
            | Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::ClientClosed | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
