//! # Token Verification
//!
//! Adapter between the authorizers and the identity provider's token verifier.
//!
//! The verifier itself is a collaborator ([`TokenVerifier`]) built by a
//! [`TokenVerifierFactory`]. [`LazyTokenVerifier`] builds it on the first bearer
//! request of a process, keeps it for the process lifetime, and folds every
//! verification failure into a [`TokenVerificationOutcome`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::core::error::AuthorizerResult;

/// Claims of a token that passed every check
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    /// The token's client identifier claim
    pub client_id: String,
    /// Every claim of the token payload
    pub raw_claims: Value,
}

/// Why a token was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenVerifyError {
    /// Signature was fine but the validity window has passed
    #[error("Token expired")]
    Expired,

    /// Bad signature, wrong issuer, missing scope, malformed token, ...
    #[error("Invalid token: {reason}")]
    Invalid { reason: String },
}

impl TokenVerifyError {
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Classify a verifier that only reports failures as text.
    ///
    /// Any message mentioning token expiry counts as `Expired`.
    pub fn from_message(message: &str) -> Self {
        if message.contains("Token expired") {
            Self::Expired
        } else {
            Self::invalid(message)
        }
    }
}

/// Verifies bearer tokens against the identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenVerifyError>;
}

/// Builds the process-wide [`TokenVerifier`] from configuration
pub trait TokenVerifierFactory: Send + Sync {
    fn create(&self) -> AuthorizerResult<Arc<dyn TokenVerifier>>;
}

/// Result of verifying one token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenVerificationOutcome {
    Valid(VerifiedClaims),
    Expired,
    Invalid,
}

impl From<Result<VerifiedClaims, TokenVerifyError>> for TokenVerificationOutcome {
    fn from(result: Result<VerifiedClaims, TokenVerifyError>) -> Self {
        match result {
            Ok(claims) => Self::Valid(claims),
            Err(TokenVerifyError::Expired) => Self::Expired,
            Err(TokenVerifyError::Invalid { reason }) => {
                tracing::debug!(reason = %reason, "Token rejected");
                Self::Invalid
            }
        }
    }
}

/// A [`TokenVerifier`] built on first use and kept for the process lifetime.
pub struct LazyTokenVerifier {
    factory: Arc<dyn TokenVerifierFactory>,
    verifier: OnceCell<Arc<dyn TokenVerifier>>,
}

impl LazyTokenVerifier {
    pub fn new(factory: Arc<dyn TokenVerifierFactory>) -> Self {
        Self {
            factory,
            verifier: OnceCell::new(),
        }
    }

    /// Whether the verifier has been constructed in this process
    pub fn is_initialized(&self) -> bool {
        self.verifier.initialized()
    }

    /// Verify a token.
    ///
    /// Errors only when the verifier cannot be constructed (e.g. missing user pool);
    /// rejected tokens are reported through the outcome.
    pub async fn verify(&self, token: &str) -> AuthorizerResult<TokenVerificationOutcome> {
        let verifier = self
            .verifier
            .get_or_try_init(|| async {
                tracing::debug!("Creating token verifier");
                self.factory.create()
            })
            .await?;

        Ok(verifier.verify(token).await.into())
    }
}
