//! Error handling module for the document assistant client.
//!
//! Provides a single error type with stable codes, plus decoding of the backend's
//! error envelopes into that type.

use reqwest::StatusCode;
use serde::Deserialize;

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

/// Client error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Credential missing, rejected or expired
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Input rejected before reaching the backend
    Validation(String),
    /// Backend rejected the request as malformed
    BadRequest(String),
    /// Any other non-success response
    Server { status: u16, message: String },
    /// Network or connection failure
    Transport(String),
    /// Response body could not be decoded
    Decode(String),
    /// Local persistence failure (credential file)
    Storage(String),
}

impl ClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Unauthorized(_) => codes::UNAUTHORIZED,
            ClientError::NotFound(_) => codes::NOT_FOUND,
            ClientError::Validation(_) => codes::VALIDATION_ERROR,
            ClientError::BadRequest(_) => codes::BAD_REQUEST,
            ClientError::Server { .. } => codes::SERVER_ERROR,
            ClientError::Transport(_) => codes::TRANSPORT_ERROR,
            ClientError::Decode(_) => codes::DECODE_ERROR,
            ClientError::Storage(_) => codes::STORAGE_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            ClientError::Unauthorized(msg) => msg.clone(),
            ClientError::NotFound(msg) => msg.clone(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::BadRequest(msg) => msg.clone(),
            ClientError::Server { message, .. } => message.clone(),
            ClientError::Transport(msg) => msg.clone(),
            ClientError::Decode(msg) => msg.clone(),
            ClientError::Storage(msg) => msg.clone(),
        }
    }

    /// Map a non-success HTTP status and its message to an error.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 | 403 => ClientError::Unauthorized(message),
            404 => ClientError::NotFound(message),
            400 | 422 => ClientError::BadRequest(message),
            other => ClientError::Server {
                status: other,
                message,
            },
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Server { status, message } => {
                write!(f, "{} ({}): {}", self.error_code(), status, message)
            }
            _ => write!(f, "{}: {}", self.error_code(), self.message()),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP error: {:?}", err);
        if err.is_decode() {
            ClientError::Decode(format!("Response decode error: {}", err))
        } else if let Some(status) = err.status() {
            ClientError::from_status(status, err.to_string())
        } else {
            ClientError::Transport(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        ClientError::Decode(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("IO error: {:?}", err);
        ClientError::Storage(format!("IO error: {}", err))
    }
}

/// Error details in a structured error envelope.
#[derive(Debug, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// The `error` member of an error envelope: either structured or a bare message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Details(ErrorDetails),
    Message(String),
}

/// Error response envelope returned by the backend.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
    /// Some endpoints report failures as `{"detail": "..."}`
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Best human-readable message carried by the envelope.
    pub fn into_message(self) -> Option<String> {
        match self.error {
            Some(ErrorPayload::Details(details)) => Some(details.message),
            Some(ErrorPayload::Message(message)) => Some(message),
            None => self.detail,
        }
    }
}

/// Decode an error body for the given status into a client error.
///
/// Falls back to the canonical status reason when the body is not an envelope.
pub fn decode_error_body(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(ErrorResponse::into_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    ClientError::from_status(status, message)
}
