//! # Gateway Authorizer Library
//!
//! Request-time authorization for an HTTP API gateway. For every incoming request
//! the gateway hands an authorization event to one of the authorizers in [`auth`]
//! and gets back an allow/deny decision plus a small context map (who the caller
//! is, and which credentials to forward to the backend).
//!
//! Three authorizers are available:
//!
//! - Basic Auth against static credentials kept in a secret store
//! - Bearer access tokens verified against a Cognito user pool
//! - Either of the two on the same route
//!
//! Secrets and token verifiers are resolved lazily on the first request a process
//! serves and then kept for the lifetime of the process.
//!
//! ## Module Layout
//!
//! - `core` - error taxonomy and configuration
//! - `auth` - decision model, credential handling, token verification, authorizers
//! - `gateway` - HTTP surface hosting the authorizers
//! - `observability` - logging and Prometheus counters

/// Error types and configuration shared by every other module
pub mod core;

/// Authorization decisions and the authorizers producing them
pub mod auth;

/// HTTP server exposing the authorizers
pub mod gateway;

/// Structured logging and metrics
pub mod observability;

/// Main error type used throughout the crate
pub use core::error::{AuthorizerError, AuthorizerResult};

/// Configuration structures
pub use core::config::{AuthorizerConfig, ServiceConfig};

pub use auth::{
    AuthorizationDecision, Authorizer, AuthorizerContext, AuthorizerRequest, BasicAuthAuthorizer,
    BearerAuthorizer, CombinedAuthorizer,
};

pub use gateway::{AuthorizerServer, AuthorizerState};
