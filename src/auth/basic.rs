//! # Basic Auth Authorizer
//!
//! Verifies `Authorization: Basic ...` headers against static credentials kept in
//! the secret named by `CREDENTIALS_SECRET_NAME`.

use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::auth::credentials::EncodedCredential;
use crate::auth::secrets::SecretAccessor;
use crate::auth::store::CredentialStore;
use crate::auth::{
    AuthScheme, AuthorizationDecision, Authorizer, AuthorizerContext, AuthorizerRequest,
};
use crate::core::config::{AuthorizerConfig, CREDENTIALS_SECRET_NAME};
use crate::core::error::AuthorizerResult;

pub struct BasicAuthAuthorizer {
    credentials: CredentialStore,
}

impl BasicAuthAuthorizer {
    pub fn new(config: &AuthorizerConfig, secrets: Arc<dyn SecretAccessor>) -> Self {
        Self {
            credentials: CredentialStore::new(
                secrets,
                config.credentials_secret_name.clone(),
                CREDENTIALS_SECRET_NAME,
            ),
        }
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.credentials
    }
}

#[async_trait]
impl Authorizer for BasicAuthAuthorizer {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn handle(&self, request: &AuthorizerRequest) -> AuthorizerResult<AuthorizationDecision> {
        let header = match request.authorization().map(AuthScheme::parse) {
            Some(AuthScheme::Basic { header }) => header,
            _ => return Ok(AuthorizationDecision::deny()),
        };

        let expected = self.credentials.expected_credentials().await?;

        Ok(match find_matching(header, &expected) {
            Some(credential) => {
                AuthorizationDecision::allow(AuthorizerContext::for_username(credential.username()))
            }
            None => AuthorizationDecision::deny(),
        })
    }
}

/// First expected credential whose header value equals `header`.
///
/// Every candidate is compared in constant time, so the time taken does not reveal
/// how much of the header matched.
pub(crate) fn find_matching<'a>(
    header: &str,
    expected: &'a [EncodedCredential],
) -> Option<&'a EncodedCredential> {
    expected
        .iter()
        .find(|credential| constant_time_eq(header, credential.header_value()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
