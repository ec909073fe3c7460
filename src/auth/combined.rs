//! # Bearer-or-Basic Authorizer
//!
//! Accepts either a bearer access token (verified like [`super::BearerAuthorizer`])
//! or Basic Auth credentials from the secret named by
//! `BASIC_AUTH_CREDENTIALS_SECRET_NAME`. Without that secret name Basic Auth
//! requests are always denied.
//!
//! Both branches hand the backend the same `internalAuthorizationHeader`: the
//! matched credential for Basic Auth, the first configured credential for bearer
//! tokens. A backend can then expect the same internal header whichever scheme the
//! caller used.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::basic::find_matching;
use crate::auth::bearer::verify_bearer;
use crate::auth::cognito::CognitoVerifierFactory;
use crate::auth::credentials::EncodedCredential;
use crate::auth::secrets::SecretAccessor;
use crate::auth::store::CredentialStore;
use crate::auth::token::{LazyTokenVerifier, TokenVerifierFactory};
use crate::auth::{
    AuthScheme, AuthorizationDecision, Authorizer, AuthorizerContext, AuthorizerRequest,
};
use crate::core::config::{AuthorizerConfig, BASIC_AUTH_CREDENTIALS_SECRET_NAME};
use crate::core::error::AuthorizerResult;

pub struct CombinedAuthorizer {
    tokens: LazyTokenVerifier,
    basic_credentials: CredentialStore,
}

impl CombinedAuthorizer {
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
            basic_credentials: CredentialStore::new(
                secrets,
                config.basic_auth_credentials_secret_name.clone(),
                BASIC_AUTH_CREDENTIALS_SECRET_NAME,
            ),
        }
    }

    pub fn token_verifier(&self) -> &LazyTokenVerifier {
        &self.tokens
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.basic_credentials
    }

    /// Expected Basic Auth credentials, or `None` when none are configured
    async fn expected_basic_credentials(&self) -> AuthorizerResult<Option<Arc<[EncodedCredential]>>> {
        if !self.basic_credentials.is_configured() {
            return Ok(None);
        }
        self.basic_credentials.expected_credentials().await.map(Some)
    }
}

#[async_trait]
impl Authorizer for CombinedAuthorizer {
    fn name(&self) -> &'static str {
        "combined"
    }

    async fn handle(&self, request: &AuthorizerRequest) -> AuthorizerResult<AuthorizationDecision> {
        let Some(header) = request.authorization() else {
            return Ok(AuthorizationDecision::deny());
        };

        // Resolved up front so a broken secret fails every request, not only Basic ones
        let expected = self.expected_basic_credentials().await?;

        match (AuthScheme::parse(header), expected) {
            (AuthScheme::Bearer { token }, expected) => {
                Ok(match verify_bearer(&self.tokens, token).await? {
                    Some(claims) => {
                        let internal_header = expected
                            .as_ref()
                            .and_then(|credentials| credentials.first())
                            .map(|credential| credential.header_value().to_string());
                        AuthorizationDecision::allow(AuthorizerContext::for_client(
                            claims.client_id,
                            internal_header,
                        ))
                    }
                    None => AuthorizationDecision::deny(),
                })
            }
            (AuthScheme::Basic { header }, Some(expected)) => {
                Ok(match find_matching(header, &expected) {
                    Some(credential) => AuthorizationDecision::allow(AuthorizerContext {
                        username: Some(credential.username().to_string()),
                        internal_authorization_header: Some(credential.header_value().to_string()),
                        ..AuthorizerContext::default()
                    }),
                    None => AuthorizationDecision::deny(),
                })
            }
            (AuthScheme::Basic { .. }, None) | (AuthScheme::Unsupported, _) => {
                Ok(AuthorizationDecision::deny())
            }
        }
    }
}
