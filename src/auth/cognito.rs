//! # Cognito Access Token Verifier
//!
//! Verifies access tokens issued by a Cognito user pool against the pool's
//! published key set (JWKS).
//!
//! For a user pool `<region>_<id>` the issuer is
//! `https://cognito-idp.<region>.amazonaws.com/<region>_<id>` and the key set lives
//! at `<issuer>/.well-known/jwks.json`.
//!
//! A token is accepted when:
//! - it is signed with RS256 by a key from the key set (looked up by `kid`),
//! - it has not expired (no leeway),
//! - `iss` matches the pool's issuer,
//! - `token_use` is `access`,
//! - the space-separated `scope` claim contains the required scope, if one is set.
//!
//! Access tokens carry `client_id` instead of `aud`, so no audience check is made.
//!
//! ## Key Set Caching
//!
//! The key set is fetched on first use and kept. A token whose `kid` is not in the
//! cached set triggers a refresh, but at most once per minimum refresh interval;
//! inside the interval the token is rejected without contacting the identity
//! provider. Refreshes are serialized, so concurrent cache misses share one fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::auth::token::{TokenVerifier, TokenVerifierFactory, TokenVerifyError, VerifiedClaims};
use crate::core::config::AuthorizerConfig;
use crate::core::error::{AuthorizerError, AuthorizerResult};

/// Builds a [`CognitoJwtVerifier`] from the authorizer configuration
#[derive(Debug, Clone)]
pub struct CognitoVerifierFactory {
    config: AuthorizerConfig,
}

impl CognitoVerifierFactory {
    pub fn new(config: AuthorizerConfig) -> Self {
        Self { config }
    }
}

impl TokenVerifierFactory for CognitoVerifierFactory {
    fn create(&self) -> AuthorizerResult<Arc<dyn TokenVerifier>> {
        let user_pool_id = self.config.require_user_pool_id()?;
        let mut verifier = CognitoJwtVerifier::new(
            user_pool_id,
            self.config.required_scope().map(str::to_string),
            self.config.jwks_timeout,
        )?
        .with_min_refresh_interval(self.config.jwks_refresh_interval);
        if let Some(uri) = &self.config.jwks_uri {
            verifier = verifier.with_jwks_uri(uri.clone());
        }

        tracing::info!(
            issuer = %verifier.issuer(),
            required_scope = ?self.config.required_scope(),
            "Created access token verifier"
        );
        Ok(Arc::new(verifier))
    }
}

/// The last key set fetched and when it was fetched
#[derive(Default)]
struct CachedKeys {
    jwks: Option<Arc<JwkSet>>,
    fetched_at: Option<Instant>,
}

impl CachedKeys {
    fn refreshed_within(&self, interval: Duration) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| fetched_at.elapsed() < interval)
    }
}

/// Access token verifier for a single user pool
pub struct CognitoJwtVerifier {
    issuer: String,
    jwks_uri: String,
    required_scope: Option<String>,
    http_client: reqwest::Client,
    min_refresh_interval: Duration,
    keys: RwLock<CachedKeys>,
    refresh: Mutex<()>,
}

impl CognitoJwtVerifier {
    /// Default minimum time between two key set fetches
    pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(
        user_pool_id: &str,
        required_scope: Option<String>,
        timeout: Duration,
    ) -> AuthorizerResult<Self> {
        let region = parse_region(user_pool_id)?;
        let issuer = format!("https://cognito-idp.{}.amazonaws.com/{}", region, user_pool_id);
        let jwks_uri = format!("{}/.well-known/jwks.json", issuer);

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            issuer,
            jwks_uri,
            required_scope: required_scope.filter(|scope| !scope.is_empty()),
            http_client,
            min_refresh_interval: Self::DEFAULT_MIN_REFRESH_INTERVAL,
            keys: RwLock::new(CachedKeys::default()),
            refresh: Mutex::new(()),
        })
    }

    /// Minimum time between key set fetches triggered by unknown key ids
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Fetch keys from somewhere other than the pool's well-known location
    pub fn with_jwks_uri<S: Into<String>>(mut self, jwks_uri: S) -> Self {
        self.jwks_uri = jwks_uri.into();
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn fetch_jwks(&self) -> Result<Arc<JwkSet>, TokenVerifyError> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| TokenVerifyError::invalid(format!("failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(TokenVerifyError::invalid(format!(
                "JWKS request failed with status: {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| TokenVerifyError::invalid(format!("failed to parse JWKS: {}", e)))?;

        let jwks = Arc::new(jwks);
        *self.keys.write().await = CachedKeys {
            jwks: Some(Arc::clone(&jwks)),
            fetched_at: Some(Instant::now()),
        };
        Ok(jwks)
    }

    /// Look `kid` up in the cached key set.
    ///
    /// `None` means a fetch is needed; an error means the key is unknown and the
    /// cached set is too fresh to refetch.
    async fn cached_key(&self, kid: &str) -> Option<Result<DecodingKey, TokenVerifyError>> {
        let keys = self.keys.read().await;
        let jwks = keys.jwks.as_ref()?;

        if let Some(jwk) = jwks.find(kid) {
            return Some(key_from_jwk(jwk));
        }
        if keys.refreshed_within(self.min_refresh_interval) {
            tracing::debug!(kid = %kid, "Unknown key id, JWKS refreshed recently");
            return Some(Err(unknown_kid(kid)));
        }
        None
    }

    /// Decoding key for `kid`, refreshing the key set if the key is unknown
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, TokenVerifyError> {
        if let Some(key) = self.cached_key(kid).await {
            return key;
        }

        let _refresh = self.refresh.lock().await;
        // Another request may have refreshed while this one waited
        if let Some(key) = self.cached_key(kid).await {
            return key;
        }

        tracing::debug!(kid = %kid, "Refreshing JWKS");
        let jwks = self.fetch_jwks().await?;
        match jwks.find(kid) {
            Some(jwk) => key_from_jwk(jwk),
            None => Err(unknown_kid(kid)),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation
    }

    fn check_claims(&self, claims: Value) -> Result<VerifiedClaims, TokenVerifyError> {
        match claims.get("token_use").and_then(Value::as_str) {
            Some("access") => {}
            other => {
                return Err(TokenVerifyError::invalid(format!(
                    "token_use must be 'access', got {:?}",
                    other
                )))
            }
        }

        if let Some(required) = &self.required_scope {
            let has_scope = claims
                .get("scope")
                .and_then(Value::as_str)
                .is_some_and(|scope| scope.split_whitespace().any(|s| s == required));
            if !has_scope {
                return Err(TokenVerifyError::invalid(format!(
                    "missing required scope '{}'",
                    required
                )));
            }
        }

        let client_id = claims
            .get("client_id")
            .and_then(Value::as_str)
            .ok_or_else(|| TokenVerifyError::invalid("missing client_id claim"))?
            .to_string();

        Ok(VerifiedClaims {
            client_id,
            raw_claims: claims,
        })
    }
}

#[async_trait]
impl TokenVerifier for CognitoJwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenVerifyError> {
        let header = decode_header(token)
            .map_err(|e| TokenVerifyError::invalid(format!("failed to decode JWT header: {}", e)))?;

        if header.alg != Algorithm::RS256 {
            return Err(TokenVerifyError::invalid(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| TokenVerifyError::invalid("JWT header has no kid"))?;
        let key = self.decoding_key(&kid).await?;

        let data = decode::<Value>(token, &key, &self.validation()).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenVerifyError::Expired,
            _ => TokenVerifyError::invalid(e.to_string()),
        })?;

        self.check_claims(data.claims)
    }
}

fn unknown_kid(kid: &str) -> TokenVerifyError {
    TokenVerifyError::invalid(format!("no key with kid '{}'", kid))
}

fn key_from_jwk(jwk: &jsonwebtoken::jwk::Jwk) -> Result<DecodingKey, TokenVerifyError> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| TokenVerifyError::invalid(format!("unusable JWK: {}", e)))
}

/// `eu-west-1_AbCdEf123` -> `eu-west-1`
fn parse_region(user_pool_id: &str) -> AuthorizerResult<&str> {
    match user_pool_id.split_once('_') {
        Some((region, id))
            if region.contains('-')
                && !id.is_empty()
                && region
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && id.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            Ok(region)
        }
        _ => Err(AuthorizerError::config(format!(
            "Invalid user pool id: {}",
            user_pool_id
        ))),
    }
}
