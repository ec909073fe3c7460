//! # Secret Accessors
//!
//! The secret store the credential secrets are read from. Accessors only hand back
//! the raw secret string; parsing lives in [`crate::auth::credentials`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::SecretsConfig;
use crate::core::error::{AuthorizerError, AuthorizerResult};

/// Fetches a secret's string value by name.
#[async_trait]
pub trait SecretAccessor: Send + Sync {
    /// Fails with `SecretNotFound` if there is no secret with this name
    async fn get_secret(&self, name: &str) -> AuthorizerResult<String>;
}

/// Build the accessor selected in the service configuration
pub async fn from_config(config: &SecretsConfig) -> AuthorizerResult<Arc<dyn SecretAccessor>> {
    match config {
        SecretsConfig::Env => Ok(Arc::new(EnvSecretAccessor)),
        SecretsConfig::File { dir } => Ok(Arc::new(FileSecretAccessor::new(dir.clone()))),
        #[cfg(feature = "aws-secrets")]
        SecretsConfig::Aws { region } => Ok(Arc::new(
            aws::AwsSecretsManagerAccessor::new(region.clone()).await,
        )),
        #[cfg(not(feature = "aws-secrets"))]
        SecretsConfig::Aws { .. } => Err(AuthorizerError::config(
            "AWS Secrets Manager backend requires the `aws-secrets` feature",
        )),
    }
}

/// Reads each secret from the environment variable of the same name
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretAccessor;

#[async_trait]
impl SecretAccessor for EnvSecretAccessor {
    async fn get_secret(&self, name: &str) -> AuthorizerResult<String> {
        std::env::var(name).map_err(|_| AuthorizerError::secret_not_found(name))
    }
}

/// Reads each secret from a file of the same name inside a directory.
///
/// This is the mounted-secrets convention (Kubernetes or Docker secrets).
#[derive(Debug, Clone)]
pub struct FileSecretAccessor {
    base_path: PathBuf,
}

impl FileSecretAccessor {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl SecretAccessor for FileSecretAccessor {
    async fn get_secret(&self, name: &str) -> AuthorizerResult<String> {
        // Secret names like `prod/api/creds` map onto subdirectories, but never outside base_path
        if name.is_empty() || name.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AuthorizerError::secret_not_found(name));
        }

        let path = self.base_path.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AuthorizerError::secret_not_found(name))
            }
            Err(e) => Err(AuthorizerError::secret_access(name, e.to_string())),
        }
    }
}

/// In-memory secret accessor (for testing).
///
/// Counts every fetch so tests can assert how often the store was hit.
#[derive(Debug, Default)]
pub struct MemorySecretAccessor {
    secrets: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl MemorySecretAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    /// Number of `get_secret` calls so far, including failed ones
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretAccessor for MemorySecretAccessor {
    async fn get_secret(&self, name: &str) -> AuthorizerResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| AuthorizerError::secret_not_found(name))
    }
}

#[cfg(feature = "aws-secrets")]
pub mod aws {
    //! AWS Secrets Manager backend

    use async_trait::async_trait;
    use aws_config::BehaviorVersion;
    use aws_sdk_secretsmanager::Client as SecretsManagerClient;

    use super::SecretAccessor;
    use crate::core::error::{AuthorizerError, AuthorizerResult};

    /// Fetches secrets from AWS Secrets Manager
    pub struct AwsSecretsManagerAccessor {
        client: SecretsManagerClient,
    }

    impl AwsSecretsManagerAccessor {
        /// Create a client from the default credential chain, optionally pinned to a region
        pub async fn new(region: Option<String>) -> Self {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(aws_config::Region::new(region));
            }
            let config = loader.load().await;

            Self {
                client: SecretsManagerClient::new(&config),
            }
        }
    }

    #[async_trait]
    impl SecretAccessor for AwsSecretsManagerAccessor {
        async fn get_secret(&self, name: &str) -> AuthorizerResult<String> {
            let result = self
                .client
                .get_secret_value()
                .secret_id(name)
                .send()
                .await
                .map_err(|e| AuthorizerError::secret_access(name, e.to_string()))?;

            match result.secret_string() {
                Some(value) => Ok(value.to_string()),
                None => {
                    tracing::error!(secret = %name, "Secret value not found");
                    Err(AuthorizerError::secret_not_found(name))
                }
            }
        }
    }
}
