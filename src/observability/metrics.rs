//! # Metrics
//!
//! Counters exported in the Prometheus text format on `/metrics`:
//!
//! - `authorizer_decisions_total{authorizer, outcome}` where `outcome` is one of
//!   `allow`, `deny`, `unauthorized` or `error`
//! - `authorizer_secret_fetches_total{secret}`, one per secret store round trip
//!
//! Without an installed recorder every call here is a no-op.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::auth::AuthorizationDecision;
use crate::core::error::{AuthorizerError, AuthorizerResult};

pub const DECISIONS_TOTAL: &str = "authorizer_decisions_total";
pub const SECRET_FETCHES_TOTAL: &str = "authorizer_secret_fetches_total";

/// Install the global Prometheus recorder and return the handle used to render it
pub fn install_prometheus_recorder() -> AuthorizerResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AuthorizerError::internal(format!("Failed to install metrics recorder: {}", e)))
}

/// Count one authorizer invocation
pub fn record_decision(authorizer: &'static str, result: &AuthorizerResult<AuthorizationDecision>) {
    counter!(DECISIONS_TOTAL, "authorizer" => authorizer, "outcome" => outcome(result)).increment(1);
}

/// Count one fetch of `secret` from the secret store
pub fn record_secret_fetch(secret: &str) {
    counter!(SECRET_FETCHES_TOTAL, "secret" => secret.to_string()).increment(1);
}

/// Metric label for an authorizer result
pub fn outcome(result: &AuthorizerResult<AuthorizationDecision>) -> &'static str {
    match result {
        Ok(decision) if decision.is_authorized => "allow",
        Ok(_) => "deny",
        Err(AuthorizerError::Unauthorized) => "unauthorized",
        Err(_) => "error",
    }
}
