//! # HTTP Server Module
//!
//! Hosts the authorizers behind a small Axum HTTP surface:
//!
//! - `POST /authorize/{basic,bearer,combined}` takes the request-authorization
//!   event as JSON and answers with the decision as JSON.
//! - `GET /authorize` is a forward-auth check for proxies that can delegate
//!   authorization to a subrequest. It reads the incoming `Authorization` header,
//!   runs the combined authorizer and echoes the context as `x-authorizer-*`
//!   response headers.
//! - `GET /health` and `GET /metrics`.
//!
//! Status codes follow the gateway contract: 200 for any decision on the JSON
//! endpoints, 403 for a forward-auth deny, 401 for an expired token and 500 for
//! every other failure.
//!
//! ## Rust Concepts Used
//!
//! - `Arc<dyn Authorizer>` so the router state is cheap to clone per request
//! - Axum extractors (`State`, `Path`, `Json`, `HeaderMap`) for request parsing
//! - `IntoResponse` on the error type, so failures convert straight into responses

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::cognito::CognitoVerifierFactory;
use crate::auth::secrets::SecretAccessor;
use crate::auth::token::TokenVerifierFactory;
use crate::auth::{
    evaluate, AuthorizerContext, AuthorizerRequest, Authorizer, BasicAuthAuthorizer,
    BearerAuthorizer, CombinedAuthorizer,
};
use crate::core::config::{AuthorizerConfig, ServerConfig};
use crate::core::error::{AuthorizerError, AuthorizerResult};

pub const USERNAME_HEADER: &str = "x-authorizer-username";
pub const CLIENT_ID_HEADER: &str = "x-authorizer-client-id";
pub const INTERNAL_AUTHORIZATION_HEADER: &str = "x-authorizer-internal-authorization";

/// Shared state of the authorizer service
#[derive(Clone)]
pub struct AuthorizerState {
    pub basic: Arc<dyn Authorizer>,
    pub bearer: Arc<dyn Authorizer>,
    pub combined: Arc<dyn Authorizer>,
    pub metrics: Option<PrometheusHandle>,
}

impl AuthorizerState {
    /// All three authorizers, verifying bearer tokens against the configured user pool
    pub fn from_config(config: &AuthorizerConfig, secrets: Arc<dyn SecretAccessor>) -> Self {
        Self::with_verifier_factory(
            config,
            secrets,
            Arc::new(CognitoVerifierFactory::new(config.clone())),
        )
    }

    /// All three authorizers sharing one verifier factory
    pub fn with_verifier_factory(
        config: &AuthorizerConfig,
        secrets: Arc<dyn SecretAccessor>,
        factory: Arc<dyn TokenVerifierFactory>,
    ) -> Self {
        Self {
            basic: Arc::new(BasicAuthAuthorizer::new(config, Arc::clone(&secrets))),
            bearer: Arc::new(BearerAuthorizer::with_verifier_factory(
                config,
                Arc::clone(&secrets),
                Arc::clone(&factory),
            )),
            combined: Arc::new(CombinedAuthorizer::with_verifier_factory(
                config, secrets, factory,
            )),
            metrics: None,
        }
    }

    /// Serve the given Prometheus recorder on `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    fn authorizer(&self, name: &str) -> Option<&Arc<dyn Authorizer>> {
        match name {
            "basic" => Some(&self.basic),
            "bearer" => Some(&self.bearer),
            "combined" => Some(&self.combined),
            _ => None,
        }
    }
}

/// Build the service router
pub fn router(state: AuthorizerState) -> Router {
    Router::new()
        .route("/authorize", get(forward_auth))
        .route("/authorize/:authorizer", post(authorize_event))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// The authorizer HTTP service
pub struct AuthorizerServer {
    bind_addr: SocketAddr,
    app: Router,
}

impl AuthorizerServer {
    pub fn new(config: &ServerConfig, state: AuthorizerState) -> AuthorizerResult<Self> {
        let bind_addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
            .parse()
            .map_err(|e| {
                AuthorizerError::config(format!(
                    "Invalid bind address {}:{}: {}",
                    config.bind_address, config.port, e
                ))
            })?;

        Ok(Self {
            bind_addr,
            app: router(state),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> AuthorizerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            AuthorizerError::internal(format!("Failed to bind server to {}: {}", self.bind_addr, e))
        })?;

        info!("Authorizer HTTP server listening on {}", self.bind_addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AuthorizerError::internal(format!("Server error: {}", e)))
    }
}

/// `POST /authorize/:authorizer`
async fn authorize_event(
    State(state): State<AuthorizerState>,
    Path(name): Path<String>,
    Json(request): Json<AuthorizerRequest>,
) -> Response {
    let Some(authorizer) = state.authorizer(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("Unknown authorizer: {}", name) })),
        )
            .into_response();
    };

    match evaluate(authorizer.as_ref(), &request).await {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `GET /authorize`
async fn forward_auth(State(state): State<AuthorizerState>, headers: HeaderMap) -> Response {
    let request = request_from_headers(&headers);

    match evaluate(state.combined.as_ref(), &request).await {
        Ok(decision) if decision.is_authorized => {
            let mut response = StatusCode::OK.into_response();
            if let Some(context) = &decision.context {
                insert_context_headers(response.headers_mut(), context);
            }
            response
        }
        Ok(_) => (StatusCode::FORBIDDEN, Json(json!({ "message": "Forbidden" }))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    let health_info = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "gateway-authorizer"
    });

    (StatusCode::OK, Json(health_info))
}

async fn metrics_endpoint(State(state): State<AuthorizerState>) -> Response {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Build the authorizer event from incoming HTTP headers.
///
/// Headers that are not valid UTF-8 are skipped.
fn request_from_headers(headers: &HeaderMap) -> AuthorizerRequest {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    AuthorizerRequest {
        headers: Some(headers),
    }
}

fn insert_context_headers(headers: &mut HeaderMap, context: &AuthorizerContext) {
    let entries = [
        (USERNAME_HEADER, context.username.as_deref()),
        (CLIENT_ID_HEADER, context.client_id.as_deref()),
        (
            INTERNAL_AUTHORIZATION_HEADER,
            context.internal_authorization_header.as_deref(),
        ),
    ];

    for (name, value) in entries {
        let Some(value) = value else { continue };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => tracing::warn!(header = name, "Context value is not a valid header value"),
        }
    }
}
