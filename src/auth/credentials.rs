//! # Basic Auth Credentials
//!
//! Credential model and the parser for credential secrets.
//!
//! A credentials secret is a JSON object in one of three shapes, tried in order:
//!
//! 1. A single pair: `{"username": "...", "password": "..."}`
//! 2. A pre-serialized array of pairs:
//!    `{"credentials": "[{\"username\":\"...\",\"password\":\"...\"}, ...]"}`
//! 3. A pre-serialized array of encoded headers:
//!    `{"credentials": "[\"<base64(username:password)>\", ...]"}`
//!
//! The inner arrays are strings because the secret store only supports string
//! valued fields. Encoded entries are matched verbatim as `Basic <entry>`, with or
//! without base64 padding.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as BASE64};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::BASIC_PREFIX;
use crate::core::error::{AuthorizerError, AuthorizerResult};

/// Standard alphabet, accepting values with or without trailing `=`
const BASE64_ANY_PADDING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A username/password pair
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Basic base64(username:password)`
    pub fn to_basic_header(&self) -> String {
        format!(
            "{}{}",
            BASIC_PREFIX,
            BASE64.encode(format!("{}:{}", self.username, self.password))
        )
    }

    /// Decode a `base64(username:password)` value, splitting on the first `:`
    pub fn from_encoded(encoded: &str) -> Result<Self, String> {
        let bytes = BASE64_ANY_PADDING
            .decode(encoded.trim())
            .map_err(|e| format!("invalid base64: {}", e))?;
        let decoded = String::from_utf8(bytes).map_err(|_| "decoded value is not UTF-8".to_string())?;

        match decoded.split_once(':') {
            Some((username, password)) => Ok(Self::new(username, password)),
            None => Err("decoded value is not on the form username:password".to_string()),
        }
    }

    /// Decode a full `Basic ...` header value
    pub fn from_basic_header(header: &str) -> Result<Self, String> {
        let encoded = header
            .strip_prefix(BASIC_PREFIX)
            .ok_or_else(|| "header does not use the Basic scheme".to_string())?;
        Self::from_encoded(encoded)
    }

    /// Precompute the header value this credential is matched against
    pub fn encode(&self) -> EncodedCredential {
        EncodedCredential {
            header_value: self.to_basic_header(),
            username: self.username.clone(),
        }
    }
}

/// A precomputed `Basic ...` header value with the username it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedCredential {
    header_value: String,
    username: String,
}

impl std::fmt::Debug for EncodedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedCredential")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl EncodedCredential {
    /// A stored `base64(username:password)` entry, kept as-is for matching
    fn from_stored(encoded: &str) -> Result<Self, String> {
        let credential = Credential::from_encoded(encoded)?;
        Ok(Self {
            header_value: format!("{}{}", BASIC_PREFIX, encoded),
            username: credential.username,
        })
    }

    /// Always starts with `Basic `
    pub fn header_value(&self) -> &str {
        &self.header_value
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Parse a raw secret body into its credentials.
///
/// Always yields at least one credential; anything else is a `Format` error.
pub fn parse_secret(secret_name: &str, body: &str) -> AuthorizerResult<Vec<EncodedCredential>> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(secret = %secret_name, "Failed to parse secret as JSON: {}", e);
        AuthorizerError::format(secret_name, "secret is not valid JSON")
    })?;

    let credentials = parse_secret_value(secret_name, &value)?;
    if credentials.is_empty() {
        tracing::error!(secret = %secret_name, "Basic auth credentials secret contains no credentials");
        return Err(AuthorizerError::format(secret_name, "secret contains no credentials"));
    }

    Ok(credentials)
}

fn parse_secret_value(secret_name: &str, value: &Value) -> AuthorizerResult<Vec<EncodedCredential>> {
    if let Some(credential) = single_pair(value) {
        return Ok(vec![credential.encode()]);
    }

    let Some(serialized) = value.get("credentials").and_then(Value::as_str) else {
        tracing::error!(
            secret = %secret_name,
            "Basic auth credentials secret did not follow any expected format"
        );
        return Err(AuthorizerError::format(
            secret_name,
            "secret did not follow any expected format",
        ));
    };

    let inner: Value = serde_json::from_str(serialized).map_err(|e| {
        tracing::error!(secret = %secret_name, "Failed to parse credentials array as JSON: {}", e);
        AuthorizerError::format(secret_name, "credentials field is not a JSON array")
    })?;

    let Some(elements) = inner.as_array() else {
        return Err(AuthorizerError::format(
            secret_name,
            "credentials field is not a JSON array",
        ));
    };

    if let Some(pairs) = elements.iter().map(single_pair).collect::<Option<Vec<_>>>() {
        return Ok(pairs.iter().map(Credential::encode).collect());
    }

    if let Some(encoded) = elements.iter().map(Value::as_str).collect::<Option<Vec<_>>>() {
        return encoded
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                EncodedCredential::from_stored(value).map_err(|reason| {
                    tracing::error!(
                        secret = %secret_name,
                        index,
                        "Failed to decode encoded credential: {}",
                        reason
                    );
                    AuthorizerError::format(secret_name, format!("credential {}: {}", index, reason))
                })
            })
            .collect();
    }

    tracing::error!(
        secret = %secret_name,
        "Basic auth credentials secret did not follow any expected format"
    );
    Err(AuthorizerError::format(
        secret_name,
        "credentials array mixes or contains unsupported elements",
    ))
}

fn single_pair(value: &Value) -> Option<Credential> {
    let username = value.get("username")?.as_str()?;
    let password = value.get("password")?.as_str()?;
    Some(Credential::new(username, password))
}
