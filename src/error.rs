//! Error types for the Cognify service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for Cognify operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input, shown to the user as-is
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected access token
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource missing or owned by another user
    #[error("{0} not found")]
    NotFound(String),

    /// Guest trial quota exhausted
    #[error("{0}")]
    RateLimited(String),

    /// Remote content could not be fetched or read (user-facing)
    #[error("{0}")]
    Fetch(String),

    /// Pipeline failure with a public message; details are logged
    #[error("{0}")]
    Processing(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// PDF/HTML text extraction error
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// LLM or speech generation error
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Auth provider error
    #[error("Auth provider error: {0}")]
    Auth(String),

    /// Payment provider error
    #[error("{0}")]
    Billing(String),

    /// Webhook signature verification failed
    #[error("Invalid signature: {0}")]
    Signature(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for errors caused by the caller's input rather than a collaborator
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Fetch(_) | Error::Signature(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Error::Signature(_) => "Invalid signature".to_string(),
            Error::BadRequest(_)
            | Error::Unauthorized
            | Error::NotFound(_)
            | Error::RateLimited(_)
            | Error::Fetch(_)
            | Error::Processing(_)
            | Error::Config(_)
            | Error::Billing(_) => self.to_string(),
            other => {
                tracing::error!(error = %other, "request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::fetch("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::not_found("Document").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::RateLimited("slow down".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(Error::generation("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            Error::Signature("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::bad_request("x").is_client_error());
        assert!(!Error::storage("disk full").is_client_error());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(Error::not_found("Document").to_string(), "Document not found");
    }
}
