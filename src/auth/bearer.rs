//! # Bearer Token Authorizer
//!
//! Verifies `Authorization: Bearer ...` access tokens against the identity provider
//! configured through `USER_POOL_ID` (and `REQUIRED_SCOPE`, if set).
//!
//! On success the token's client id is returned as `clientId`. If
//! `CREDENTIALS_FOR_INTERNAL_AUTHORIZATION` names a secret, the first credential in
//! it is also returned as `internalAuthorizationHeader`, so the backend can require
//! Basic Auth as an additional layer behind the gateway.
//!
//! An expired token is answered with [`AuthorizerError::Unauthorized`] instead of a
//! deny: the gateway turns that exact error into a 401, which tells the client to
//! refresh its token, while a deny becomes a 403.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::cognito::CognitoVerifierFactory;
use crate::auth::secrets::SecretAccessor;
use crate::auth::store::CredentialStore;
use crate::auth::token::{
    LazyTokenVerifier, TokenVerificationOutcome, TokenVerifierFactory, VerifiedClaims,
};
use crate::auth::{
    AuthScheme, AuthorizationDecision, Authorizer, AuthorizerContext, AuthorizerRequest,
};
use crate::core::config::{AuthorizerConfig, CREDENTIALS_FOR_INTERNAL_AUTHORIZATION};
use crate::core::error::{AuthorizerError, AuthorizerResult};

pub struct BearerAuthorizer {
    tokens: LazyTokenVerifier,
    internal_credentials: CredentialStore,
}

impl BearerAuthorizer {
    /// Authorizer verifying tokens with the configured Cognito user pool
    pub fn new(config: &AuthorizerConfig, secrets: Arc<dyn SecretAccessor>) -> Self {
        Self::with_verifier_factory(
            config,
            secrets,
            Arc::new(CognitoVerifierFactory::new(config.clone())),
        )
    }

    /// Authorizer with an injected verifier factory
    pub fn with_verifier_factory(
        config: &AuthorizerConfig,
        secrets: Arc<dyn SecretAccessor>,
        factory: Arc<dyn TokenVerifierFactory>,
    ) -> Self {
        Self {
            tokens: LazyTokenVerifier::new(factory),
            internal_credentials: CredentialStore::new(
                secrets,
                config.internal_authorization_secret_name.clone(),
                CREDENTIALS_FOR_INTERNAL_AUTHORIZATION,
            ),
        }
    }

    pub fn token_verifier(&self) -> &LazyTokenVerifier {
        &self.tokens
    }

    /// The header forwarded to the backend, if internal authorization is configured.
    ///
    /// A secret that cannot be resolved leaves the header out instead of failing the
    /// request.
    async fn internal_authorization_header(&self) -> Option<String> {
        if !self.internal_credentials.is_configured() {
            return None;
        }

        match self.internal_credentials.first_credential().await {
            Ok(credential) => Some(credential.header_value().to_string()),
            Err(err) => {
                tracing::warn!(
                    secret = ?self.internal_credentials.secret_name(),
                    error = %err,
                    "Could not resolve internal authorization credentials, omitting header"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Authorizer for BearerAuthorizer {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn handle(&self, request: &AuthorizerRequest) -> AuthorizerResult<AuthorizationDecision> {
        let token = match request.authorization().map(AuthScheme::parse) {
            Some(AuthScheme::Bearer { token }) => token,
            _ => return Ok(AuthorizationDecision::deny()),
        };

        Ok(match verify_bearer(&self.tokens, token).await? {
            Some(claims) => AuthorizationDecision::allow(AuthorizerContext::for_client(
                claims.client_id,
                self.internal_authorization_header().await,
            )),
            None => AuthorizationDecision::deny(),
        })
    }
}

/// Verify a bearer token.
///
/// `Ok(None)` for an invalid token, `Err(Unauthorized)` for an expired one.
pub(crate) async fn verify_bearer(
    tokens: &LazyTokenVerifier,
    token: &str,
) -> AuthorizerResult<Option<VerifiedClaims>> {
    match tokens.verify(token).await? {
        TokenVerificationOutcome::Valid(claims) => Ok(Some(claims)),
        TokenVerificationOutcome::Invalid => Ok(None),
        TokenVerificationOutcome::Expired => Err(AuthorizerError::Unauthorized),
    }
}
