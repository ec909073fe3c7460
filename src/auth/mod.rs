//! # Authorizers
//!
//! Request-time authorization decisions for the gateway. Three interchangeable
//! authorizers are provided:
//!
//! - [`BasicAuthAuthorizer`] - `Authorization: Basic ...` against credentials kept
//!   in a secret.
//! - [`BearerAuthorizer`] - `Authorization: Bearer ...` verified against the
//!   identity provider, optionally forwarding internal Basic Auth credentials.
//! - [`CombinedAuthorizer`] - accepts either scheme.
//!
//! Every authorizer answers with an [`AuthorizationDecision`] or an error. A deny is
//! a normal decision (HTTP 403 at the gateway); an expired token is the
//! [`AuthorizerError::Unauthorized`] error (HTTP 401); any other error is an
//! execution failure.
//!
//! ## Rust Concepts Used
//!
//! - `#[async_trait]` so authorizers can be held as `Arc<dyn Authorizer>`
//! - `tokio::sync::OnceCell` for the warm-process caches (filled at most once)
//! - Borrowed enums (`AuthScheme<'a>`) so header parsing never allocates

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::AuthorizerResult;
use crate::observability::metrics;

pub mod basic;
pub mod bearer;
pub mod cognito;
pub mod combined;
pub mod credentials;
pub mod secrets;
pub mod store;
pub mod token;

#[cfg(test)]
mod tests;

pub use basic::BasicAuthAuthorizer;
pub use bearer::BearerAuthorizer;
pub use cognito::{CognitoJwtVerifier, CognitoVerifierFactory};
pub use combined::CombinedAuthorizer;
pub use credentials::{Credential, EncodedCredential};
pub use secrets::{EnvSecretAccessor, FileSecretAccessor, MemorySecretAccessor, SecretAccessor};
pub use store::CredentialStore;
pub use token::{
    LazyTokenVerifier, TokenVerificationOutcome, TokenVerifier, TokenVerifierFactory,
    TokenVerifyError, VerifiedClaims,
};

/// Prefix of a Basic Auth header value
pub const BASIC_PREFIX: &str = "Basic ";

/// Prefix of a bearer token header value
pub const BEARER_PREFIX: &str = "Bearer ";

/// Context keys read by the access log format and backend parameter mapping.
pub const CONTEXT_USERNAME: &str = "username";
pub const CONTEXT_CLIENT_ID: &str = "clientId";
pub const CONTEXT_INTERNAL_AUTHORIZATION_HEADER: &str = "internalAuthorizationHeader";

/// The request-authorization event handed over by the gateway.
///
/// Only the headers are used. Header names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizerRequest {
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl AuthorizerRequest {
    /// Event with no headers at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Event carrying only an `authorization` header
    pub fn with_authorization<S: Into<String>>(value: S) -> Self {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), value.into());
        Self {
            headers: Some(headers),
        }
    }

    /// The raw `Authorization` header value, if present
    pub fn authorization(&self) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        headers
            .get("authorization")
            .or_else(|| {
                headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }
}

/// Scheme of an `Authorization` header, as far as the authorizers care.
///
/// Prefixes are matched case-sensitively, including the trailing space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme<'a> {
    /// `Basic <base64>`; the whole header is kept since it is compared verbatim
    Basic { header: &'a str },
    /// `Bearer <token>`
    Bearer { token: &'a str },
    /// Anything else
    Unsupported,
}

impl<'a> AuthScheme<'a> {
    pub fn parse(header: &'a str) -> Self {
        if let Some(token) = header.strip_prefix(BEARER_PREFIX) {
            Self::Bearer { token }
        } else if header.starts_with(BASIC_PREFIX) {
            Self::Basic { header }
        } else {
            Self::Unsupported
        }
    }
}

/// Metadata returned alongside an allow decision.
///
/// Serialized key names are a compatibility surface and must not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_authorization_header: Option<String>,
}

impl AuthorizerContext {
    /// Context for a matched Basic Auth credential
    pub fn for_username<S: Into<String>>(username: S) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Context for a verified bearer token
    pub fn for_client(client_id: String, internal_authorization_header: Option<String>) -> Self {
        Self {
            client_id: Some(client_id),
            internal_authorization_header,
            ..Self::default()
        }
    }

    /// Flatten into the key/value map the gateway attaches to the request
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(username) = &self.username {
            map.insert(CONTEXT_USERNAME.to_string(), username.clone());
        }
        if let Some(client_id) = &self.client_id {
            map.insert(CONTEXT_CLIENT_ID.to_string(), client_id.clone());
        }
        if let Some(header) = &self.internal_authorization_header {
            map.insert(CONTEXT_INTERNAL_AUTHORIZATION_HEADER.to_string(), header.clone());
        }
        map
    }
}

/// The only value handed back to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub is_authorized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AuthorizerContext>,
}

impl AuthorizationDecision {
    pub fn allow(context: AuthorizerContext) -> Self {
        Self {
            is_authorized: true,
            context: Some(context),
        }
    }

    pub fn deny() -> Self {
        Self {
            is_authorized: false,
            context: None,
        }
    }
}

/// A request-time authorization strategy.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Short name used in logs and metric labels
    fn name(&self) -> &'static str;

    /// Decide on a single request
    async fn handle(&self, request: &AuthorizerRequest) -> AuthorizerResult<AuthorizationDecision>;
}

/// Run an authorizer and record the outcome in logs and metrics.
pub async fn evaluate(
    authorizer: &dyn Authorizer,
    request: &AuthorizerRequest,
) -> AuthorizerResult<AuthorizationDecision> {
    let result = authorizer.handle(request).await;

    match &result {
        Ok(decision) if decision.is_authorized => {
            tracing::debug!(authorizer = authorizer.name(), "Request authorized");
        }
        Ok(_) => {
            tracing::debug!(authorizer = authorizer.name(), "Request denied");
        }
        Err(err) if err.is_unauthorized() => {
            tracing::info!(authorizer = authorizer.name(), "Rejected expired token");
        }
        Err(err) => {
            tracing::error!(
                authorizer = authorizer.name(),
                error = %err,
                error_type = err.error_type(),
                "Authorizer failed"
            );
        }
    }

    metrics::record_decision(authorizer.name(), &result);
    result
}
