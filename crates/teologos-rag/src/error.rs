//! Error types for the RAG service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing or wrong bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Unknown agent or document
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding provider error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Embedding call rejected by the provider or lost in transit
    #[error("Embedding request failed: {0}")]
    EmbeddingRequest(#[source] ProviderError),

    /// Vector index error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Chat completion failed after retries, or timed out
    #[error("{message}")]
    LlmUnavailable {
        message: String,
        status_code: Option<u16>,
    },

    /// Relational store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an LLM unavailability error
    pub fn llm_unavailable(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::LlmUnavailable {
            message: message.into(),
            status_code,
        }
    }

    /// True for errors caused by the caller's input
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// HTTP status and machine-readable code exposed to clients
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::LlmUnavailable { .. } => (StatusCode::BAD_GATEWAY, "LLM_ERROR"),
            Error::Config(_)
            | Error::Embedding(_)
            | Error::EmbeddingRequest(_)
            | Error::VectorDb(_)
            | Error::Storage(_)
            | Error::Io(_)
            | Error::Http(_)
            | Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Provider detail stays in the logs
        match &self {
            Error::LlmUnavailable {
                message,
                status_code,
            } => {
                tracing::error!(status_code = ?status_code, "{}", message);
            }
            err if status.is_server_error() => tracing::error!("{}", err),
            err => tracing::debug!("{}", err),
        }

        (status, Json(json!({ "error": code }))).into_response()
    }
}

/// Failure of a single outbound provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP status
    #[error("provider returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Wait requested through `Retry-After`
        retry_after: Option<Duration>,
    },

    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Transport-level timeout
    #[error("request timed out")]
    Timeout,

    /// Completion text was missing or blank
    #[error("provider returned an empty completion")]
    EmptyCompletion,

    /// Body could not be decoded
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Build a status error from a status code and response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    /// Attach the provider's requested wait before the next attempt
    pub fn with_retry_after(self, wait: Option<Duration>) -> Self {
        match self {
            ProviderError::Status { status, body, .. } => ProviderError::Status {
                status,
                body,
                retry_after: wait,
            },
            other => other,
        }
    }

    /// Provider HTTP status, when the failure carried one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Classification consumed by the retry loop
pub trait Retryable {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Wait asked for by the remote side, replacing the backoff delay
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            // 429 is rate limiting; every other 4xx is the request's fault
            ProviderError::Status { status, .. } => {
                !((400..500).contains(status) && *status != 429)
            }
            _ => true,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::EmbeddingRequest(err) => err.is_retryable(),
            Error::Http(_) => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::EmbeddingRequest(err) => err.retry_after(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_fatal() {
        assert!(!ProviderError::status(400, "bad").is_retryable());
        assert!(!ProviderError::status(401, "").is_retryable());
        assert!(!ProviderError::status(404, "").is_retryable());
    }

    #[test]
    fn test_rate_limit_and_server_errors_retry() {
        assert!(ProviderError::status(429, "").is_retryable());
        assert!(ProviderError::status(500, "").is_retryable());
        assert!(ProviderError::status(503, "").is_retryable());
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::EmptyCompletion.is_retryable());
        assert!(ProviderError::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_only_on_status() {
        let wait = Some(Duration::from_secs(3));
        assert_eq!(ProviderError::status(429, "").with_retry_after(wait).retry_after(), wait);
        assert_eq!(ProviderError::Timeout.with_retry_after(wait).retry_after(), None);
    }

    #[test]
    fn test_service_error_classification() {
        let limited = Error::EmbeddingRequest(
            ProviderError::status(429, "").with_retry_after(Some(Duration::from_secs(2))),
        );
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));
        assert!(!Error::EmbeddingRequest(ProviderError::status(401, "")).is_retryable());
        assert!(!Error::embedding("count mismatch").is_retryable());
        assert!(!Error::validation("bad").is_retryable());
    }

    #[test]
    fn test_public_codes() {
        assert_eq!(Error::Unauthorized.status_and_code().1, "UNAUTHORIZED");
        assert_eq!(Error::validation("x").status_and_code().1, "INVALID_INPUT");
        assert_eq!(
            Error::llm_unavailable("LLM request failed", Some(500)).status_and_code(),
            (StatusCode::BAD_GATEWAY, "LLM_ERROR")
        );
        assert_eq!(
            Error::embedding("boom").status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        );
    }

    #[tokio::test]
    async fn test_response_body_hides_detail() {
        let response = Error::vector_db("secret upstream body").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "INTERNAL_ERROR" }));
    }
}
