//! Error types and handling for the chat relay.
//!
//! [`AppError`] covers everything that can go wrong before a stream starts and
//! converts into a structured JSON response. [`UpstreamError`] is the terminal
//! error item an upstream chunk stream can yield; it becomes an [`AppError`] only
//! when it happens before the first byte reaches the client.

use crate::core::error_types::{
    ErrorCategoryCode, ERROR_CODE_EMPTY_MESSAGES, ERROR_CODE_INTERNAL, ERROR_CODE_INVALID_JSON,
    ERROR_CODE_INVALID_MESSAGES, ERROR_CODE_MISSING_CREDENTIAL, ERROR_CODE_PROVIDER,
    ERROR_CODE_UPSTREAM_TIMEOUT, ERROR_TYPE_API, ERROR_TYPE_CONFIGURATION,
    ERROR_TYPE_INVALID_REQUEST, ERROR_TYPE_TIMEOUT, ERROR_TYPE_UPSTREAM,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Reasons a chat request is rejected before reaching the provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid messages format")]
    InvalidMessages,

    #[error("Messages must not be empty")]
    EmptyMessages,
}

impl ValidationError {
    pub const fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidJson(_) => ERROR_CODE_INVALID_JSON,
            ValidationError::InvalidMessages => ERROR_CODE_INVALID_MESSAGES,
            ValidationError::EmptyMessages => ERROR_CODE_EMPTY_MESSAGES,
        }
    }
}

/// Failures surfaced by an upstream completion stream.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// No credential configured; detected before any network I/O.
    #[error("AI_GATEWAY_API_KEY not configured")]
    MissingCredential,

    /// Network-level failure (connect, timeout, body read).
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-2xx status.
    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Provider stream could not be decoded.
    #[error("Malformed upstream stream: {0}")]
    Framing(String),
}

impl UpstreamError {
    /// Classify this error for logs and metrics.
    pub fn category(&self) -> ErrorCategoryCode {
        match self {
            UpstreamError::MissingCredential => ErrorCategoryCode::Configuration,
            UpstreamError::Transport(e) if e.is_timeout() => ErrorCategoryCode::Timeout,
            UpstreamError::Transport(e) if e.is_connect() => ErrorCategoryCode::Connect,
            UpstreamError::Transport(_) => ErrorCategoryCode::Network,
            UpstreamError::Status { status, .. } => ErrorCategoryCode::from_status(*status),
            UpstreamError::Framing(_) => ErrorCategoryCode::MalformedStream,
        }
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required configuration is missing (the upstream credential)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client sent something we cannot relay
    #[error("Bad request: {0}")]
    Validation(#[from] ValidationError),

    /// Upstream failed before streaming began
    #[error(transparent)]
    Upstream(UpstreamError),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::MissingCredential => AppError::Config(err.to_string()),
            other => AppError::Upstream(other),
        }
    }
}

impl AppError {
    pub fn missing_credential() -> Self {
        AppError::Config(UpstreamError::MissingCredential.to_string())
    }

    /// HTTP status, error type and error code for the structured body.
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_TYPE_CONFIGURATION,
                ERROR_CODE_MISSING_CREDENTIAL,
            ),
            AppError::Validation(e) => {
                (StatusCode::BAD_REQUEST, ERROR_TYPE_INVALID_REQUEST, e.code())
            }
            AppError::Upstream(UpstreamError::Transport(e)) if e.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                ERROR_TYPE_TIMEOUT,
                ERROR_CODE_UPSTREAM_TIMEOUT,
            ),
            AppError::Upstream(UpstreamError::Status { status, .. }) => (
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                ERROR_TYPE_UPSTREAM,
                ERROR_CODE_PROVIDER,
            ),
            AppError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                ERROR_TYPE_UPSTREAM,
                ERROR_CODE_PROVIDER,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_TYPE_API,
                ERROR_CODE_INTERNAL,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = self.parts();

        let message = match &self {
            AppError::Config(msg) | AppError::Internal(msg) => msg.clone(),
            AppError::Validation(e) => e.to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = code, "{}", message);
        } else {
            tracing::warn!(status = status.as_u16(), code = code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": code
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
