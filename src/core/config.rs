//! # Configuration Module
//!
//! Configuration is read once, at process start, and is immutable afterwards.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support (the gateway hands authorizers their
//!   secret names and identity provider settings through the environment)
//! - Validation that reports every problem at once
//!
//! Secret names and the user pool id are deliberately *not* required at load time.
//! Each one is only required by the authorizer that uses it, and a missing value
//! surfaces as a `Configuration` error from that authorizer's invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{AuthorizerError, AuthorizerResult};

pub const CREDENTIALS_SECRET_NAME: &str = "CREDENTIALS_SECRET_NAME";
pub const USER_POOL_ID: &str = "USER_POOL_ID";
pub const REQUIRED_SCOPE: &str = "REQUIRED_SCOPE";
pub const CREDENTIALS_FOR_INTERNAL_AUTHORIZATION: &str = "CREDENTIALS_FOR_INTERNAL_AUTHORIZATION";
pub const BASIC_AUTH_CREDENTIALS_SECRET_NAME: &str = "BASIC_AUTH_CREDENTIALS_SECRET_NAME";
pub const AUTHORIZER_JWKS_TIMEOUT: &str = "AUTHORIZER_JWKS_TIMEOUT";
pub const AUTHORIZER_JWKS_REFRESH_INTERVAL: &str = "AUTHORIZER_JWKS_REFRESH_INTERVAL";

/// Settings the authorizers themselves consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizerConfig {
    /// Secret holding the Basic Auth credentials (Basic authorizer)
    pub credentials_secret_name: Option<String>,

    /// Identity provider user pool, e.g. `eu-west-1_AbCdEf123`
    pub user_pool_id: Option<String>,

    /// Scope every bearer token must carry, if set
    pub required_scope: Option<String>,

    /// Secret whose first credential is forwarded to the backend after a
    /// successful bearer authorization (Bearer authorizer)
    pub internal_authorization_secret_name: Option<String>,

    /// Secret holding the Basic Auth credentials (Combined authorizer)
    pub basic_auth_credentials_secret_name: Option<String>,

    /// Override for the key set location; derived from the user pool when absent
    pub jwks_uri: Option<String>,

    /// Timeout for key set requests
    #[serde(with = "humantime_serde")]
    pub jwks_timeout: Duration,

    /// Minimum time between key set refreshes caused by unknown key ids
    #[serde(with = "humantime_serde")]
    pub jwks_refresh_interval: Duration,
}

impl AuthorizerConfig {
    /// Default timeout for fetching the identity provider's key set
    pub const DEFAULT_JWKS_TIMEOUT: Duration = Duration::from_secs(5);

    pub const DEFAULT_JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

    /// Build the configuration from the process environment
    pub fn from_env() -> AuthorizerResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(&|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup, usually the environment.
    ///
    /// Empty values count as absent.
    pub fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> AuthorizerResult<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(name) = get(CREDENTIALS_SECRET_NAME) {
            self.credentials_secret_name = Some(name);
        }
        if let Some(pool) = get(USER_POOL_ID) {
            self.user_pool_id = Some(pool);
        }
        if let Some(scope) = get(REQUIRED_SCOPE) {
            self.required_scope = Some(scope);
        }
        if let Some(name) = get(CREDENTIALS_FOR_INTERNAL_AUTHORIZATION) {
            self.internal_authorization_secret_name = Some(name);
        }
        if let Some(name) = get(BASIC_AUTH_CREDENTIALS_SECRET_NAME) {
            self.basic_auth_credentials_secret_name = Some(name);
        }
        if let Some(timeout) = get(AUTHORIZER_JWKS_TIMEOUT) {
            self.jwks_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                AuthorizerError::config(format!("Invalid {}: {}", AUTHORIZER_JWKS_TIMEOUT, e))
            })?;
        }
        if let Some(interval) = get(AUTHORIZER_JWKS_REFRESH_INTERVAL) {
            self.jwks_refresh_interval = humantime::parse_duration(&interval).map_err(|e| {
                AuthorizerError::config(format!(
                    "Invalid {}: {}",
                    AUTHORIZER_JWKS_REFRESH_INTERVAL, e
                ))
            })?;
        }

        Ok(())
    }

    /// Required scope with empty strings discarded
    pub fn required_scope(&self) -> Option<&str> {
        self.required_scope.as_deref().filter(|scope| !scope.is_empty())
    }

    /// User pool id for the bearer authorizers, or a configuration error
    pub fn require_user_pool_id(&self) -> AuthorizerResult<&str> {
        require(self.user_pool_id.as_deref(), USER_POOL_ID)
    }
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            credentials_secret_name: None,
            user_pool_id: None,
            required_scope: None,
            internal_authorization_secret_name: None,
            basic_auth_credentials_secret_name: None,
            jwks_uri: None,
            jwks_timeout: Self::DEFAULT_JWKS_TIMEOUT,
            jwks_refresh_interval: Self::DEFAULT_JWKS_REFRESH_INTERVAL,
        }
    }
}

/// A setting that must be present and non-empty, named by its environment key
pub(crate) fn require<'a>(value: Option<&'a str>, env_key: &str) -> AuthorizerResult<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => {
            tracing::error!("{} env variable is not defined", env_key);
            Err(AuthorizerError::config(format!("{} is not defined", env_key)))
        }
    }
}

/// HTTP server settings for the invocation surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,

    /// HTTP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Where credential secrets are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SecretsConfig {
    /// Secret values are environment variables named after the secret
    Env,
    /// One file per secret inside `dir` (mounted secrets)
    File { dir: PathBuf },
    /// AWS Secrets Manager, optionally pinned to a region
    Aws { region: Option<String> },
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self::File {
            dir: PathBuf::from("/var/run/secrets/authorizer"),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `gateway_authorizer=debug`
    pub level: String,

    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Complete configuration of the authorizer service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub authorizer: AuthorizerConfig,
    pub secrets: SecretsConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> AuthorizerResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthorizerError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: ServiceConfig = serde_yaml::from_str(&content)
            .map_err(|e| AuthorizerError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration from defaults and the environment only
    pub fn from_env() -> AuthorizerResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Service settings follow the pattern `AUTHORIZER_<FIELD>`; authorizer settings
    /// use the names the gateway passes to its authorizers.
    pub fn apply_env_overrides(&mut self) -> AuthorizerResult<()> {
        self.apply_overrides(&|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> AuthorizerResult<()> {
        if let Some(addr) = lookup("AUTHORIZER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(port) = lookup("AUTHORIZER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| AuthorizerError::config(format!("Invalid AUTHORIZER_PORT: {}", e)))?;
        }

        if let Some(level) = lookup("AUTHORIZER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("AUTHORIZER_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(backend) = lookup("AUTHORIZER_SECRETS_BACKEND") {
            self.secrets = match backend.to_lowercase().as_str() {
                "env" => SecretsConfig::Env,
                "file" => SecretsConfig::File {
                    dir: lookup("AUTHORIZER_SECRETS_DIR")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("/var/run/secrets/authorizer")),
                },
                "aws" => SecretsConfig::Aws {
                    region: lookup("AWS_REGION"),
                },
                other => {
                    return Err(AuthorizerError::config(format!(
                        "Invalid AUTHORIZER_SECRETS_BACKEND: {}",
                        other
                    )))
                }
            };
        } else if let (Some(dir), SecretsConfig::File { .. }) =
            (lookup("AUTHORIZER_SECRETS_DIR"), &self.secrets)
        {
            self.secrets = SecretsConfig::File { dir: PathBuf::from(dir) };
        }

        self.authorizer.apply_overrides(lookup)
    }

    /// Configuration validation with every problem listed in one error
    pub fn validate(&self) -> AuthorizerResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_address.is_empty() {
            errors.push("bind_address cannot be empty".to_string());
        }

        if self.server.port == 0 {
            errors.push("port must be greater than 0".to_string());
        }

        if let SecretsConfig::File { dir } = &self.secrets {
            if dir.as_os_str().is_empty() {
                errors.push("secrets dir cannot be empty".to_string());
            }
        }

        if self.authorizer.jwks_timeout.is_zero() {
            errors.push("jwks_timeout must be greater than 0".to_string());
        }

        if let Some(uri) = &self.authorizer.jwks_uri {
            if let Err(e) = url::Url::parse(uri) {
                errors.push(format!("jwks_uri is not a valid URL: {}", e));
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => errors.push(format!("Invalid log format: {}", self.logging.format)),
        }

        if !errors.is_empty() {
            return Err(AuthorizerError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}
