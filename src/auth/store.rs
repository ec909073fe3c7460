//! # Credential Store
//!
//! Resolves the expected Basic Auth credentials for one configured secret and keeps
//! them for the rest of the process lifetime. A warm process never fetches the same
//! secret twice; a cold start fetches it again.
//!
//! Failed resolutions are not cached, so the next invocation retries the fetch.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::auth::credentials::{parse_secret, EncodedCredential};
use crate::auth::secrets::SecretAccessor;
use crate::core::config::require;
use crate::core::error::{AuthorizerError, AuthorizerResult};
use crate::observability::metrics;

/// Cached credentials for a single secret.
pub struct CredentialStore {
    secrets: Arc<dyn SecretAccessor>,
    secret_name: Option<String>,
    config_key: &'static str,
    cached: OnceCell<Arc<[EncodedCredential]>>,
}

impl CredentialStore {
    /// `config_key` names the setting the secret name came from, for error messages
    pub fn new(
        secrets: Arc<dyn SecretAccessor>,
        secret_name: Option<String>,
        config_key: &'static str,
    ) -> Self {
        Self {
            secrets,
            secret_name: secret_name.filter(|name| !name.is_empty()),
            config_key,
            cached: OnceCell::new(),
        }
    }

    /// Whether a secret name was configured at all
    pub fn is_configured(&self) -> bool {
        self.secret_name.is_some()
    }

    pub fn secret_name(&self) -> Option<&str> {
        self.secret_name.as_deref()
    }

    /// Whether the credentials have been resolved in this process already
    pub fn is_cached(&self) -> bool {
        self.cached.initialized()
    }

    /// The expected credentials, in secret order.
    ///
    /// Fails with `Configuration` when no secret name is configured and with
    /// `Format` when the secret body is not one of the supported shapes.
    pub async fn expected_credentials(&self) -> AuthorizerResult<Arc<[EncodedCredential]>> {
        let secret_name = require(self.secret_name.as_deref(), self.config_key)?;

        let credentials = self
            .cached
            .get_or_try_init(|| self.fetch(secret_name))
            .await?;
        Ok(Arc::clone(credentials))
    }

    /// The first expected credential, used for internal authorization forwarding
    pub async fn first_credential(&self) -> AuthorizerResult<EncodedCredential> {
        let credentials = self.expected_credentials().await?;
        credentials
            .first()
            .cloned()
            .ok_or_else(|| AuthorizerError::internal("credential store resolved to no credentials"))
    }

    async fn fetch(&self, secret_name: &str) -> AuthorizerResult<Arc<[EncodedCredential]>> {
        metrics::record_secret_fetch(secret_name);
        let body = self.secrets.get_secret(secret_name).await?;
        let credentials = parse_secret(secret_name, &body)?;

        tracing::info!(
            secret = %secret_name,
            credentials = credentials.len(),
            "Loaded basic auth credentials"
        );
        Ok(credentials.into())
    }
}
