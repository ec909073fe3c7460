//! # Error Handling Module
//!
//! This module defines every failure an authorizer invocation can end in, using the
//! `thiserror` crate, and maps each one onto the HTTP semantics the gateway expects.
//!
//! ## Failure Taxonomy
//!
//! A normal deny is *not* an error: authorizers return `AuthorizationDecision::deny()`
//! for missing headers, wrong schemes, bad credentials and invalid tokens, and the
//! gateway answers those with 403. Errors are reserved for:
//!
//! - `Unauthorized` - an expired bearer token. The gateway matches the exact message
//!   text `Unauthorized` and answers 401 so the client knows to refresh its token.
//! - Everything else (missing configuration, malformed secrets, unreachable secret
//!   store, ...) - an authorizer execution failure, answered with 500.
//!
//! Neither error response carries internal detail back to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the authorizer
pub type AuthorizerResult<T> = Result<T, AuthorizerError>;

/// Exact message the gateway maps to HTTP 401.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Every error an authorizer invocation can surface.
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display`; the
/// `Unauthorized` variant must keep displaying exactly [`UNAUTHORIZED_MESSAGE`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizerError {
    /// A required configuration value is missing or invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A credentials secret does not match any supported shape
    #[error("Format error in secret '{secret}': {reason}")]
    Format { secret: String, reason: String },

    /// The secret store has no secret with this name
    #[error("Secret not found: {name}")]
    SecretNotFound { name: String },

    /// The secret store could not be reached or answered with an error
    #[error("Secret access failed for '{name}': {message}")]
    SecretAccess { name: String, message: String },

    /// Expired bearer token; rendered by the gateway as 401
    #[error("Unauthorized")]
    Unauthorized,

    /// Internal errors for unexpected failures
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors when talking to the identity provider
    #[error("HTTP client error: {message}")]
    HttpClient { message: String },
}

impl AuthorizerError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a format error for the given secret
    pub fn format<S: Into<String>, R: Into<String>>(secret: S, reason: R) -> Self {
        Self::Format {
            secret: secret.into(),
            reason: reason.into(),
        }
    }

    /// Create a secret-not-found error
    pub fn secret_not_found<S: Into<String>>(name: S) -> Self {
        Self::SecretNotFound { name: name.into() }
    }

    /// Create a secret access error
    pub fn secret_access<S: Into<String>, M: Into<String>>(name: S, message: M) -> Self {
        Self::SecretAccess {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is the 401 sentinel rather than an execution failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Get the HTTP status code the gateway answers with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Configuration { .. }
            | Self::Format { .. }
            | Self::SecretNotFound { .. }
            | Self::SecretAccess { .. }
            | Self::Internal { .. }
            | Self::HttpClient { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for logs and metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Format { .. } => "format_error",
            Self::SecretNotFound { .. } => "secret_not_found",
            Self::SecretAccess { .. } => "secret_access_error",
            Self::Unauthorized => "unauthorized",
            Self::Internal { .. } => "internal_error",
            Self::HttpClient { .. } => "http_client_error",
        }
    }

    /// Message safe to hand back to the caller
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => UNAUTHORIZED_MESSAGE,
            _ => "Internal Server Error",
        }
    }
}

/// Implement conversion from reqwest::Error
impl From<reqwest::Error> for AuthorizerError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpClient {
            message: err.to_string(),
        }
    }
}

/// Render errors the way the gateway does: status code plus a fixed message.
///
/// The internal detail goes to the logs, never into the body.
impl IntoResponse for AuthorizerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if !self.is_unauthorized() {
            tracing::error!(error = %self, error_type = self.error_type(), "Authorizer execution failed");
        }

        let body = json!({ "message": self.public_message() });
        (status, Json(body)).into_response()
    }
}
