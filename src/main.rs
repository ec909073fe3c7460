//! # Gateway Authorizer - Main Entry Point
//!
//! Runs the authorizers as an HTTP service.
//!
//! Configuration is read from the YAML file given as the first argument or in
//! `AUTHORIZER_CONFIG`; without either, everything comes from the environment
//! (`CREDENTIALS_SECRET_NAME`, `USER_POOL_ID`, `AUTHORIZER_PORT`, ...).

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use gateway_authorizer::auth::secrets;
use gateway_authorizer::gateway::{AuthorizerServer, AuthorizerState};
use gateway_authorizer::observability::{init_logging, install_prometheus_recorder};
use gateway_authorizer::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await?;

    init_logging(&config.logging).context("failed to initialize logging")?;

    info!("Starting gateway authorizer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!("Authorizer service failed: {}", e);
        return Err(e);
    }

    info!("Gateway authorizer shutdown complete");
    Ok(())
}

async fn load_config() -> anyhow::Result<ServiceConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("AUTHORIZER_CONFIG").ok());

    let config = match path {
        Some(path) => ServiceConfig::load_from_file(&path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => ServiceConfig::from_env().context("failed to load configuration from environment")?,
    };
    Ok(config)
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let secrets = secrets::from_config(&config.secrets).await?;
    let metrics = install_prometheus_recorder()?;

    let state = AuthorizerState::from_config(&config.authorizer, secrets).with_metrics(metrics);
    let server = AuthorizerServer::new(&config.server, state)?;

    info!(
        secrets_backend = ?config.secrets,
        bind_addr = %server.bind_addr(),
        "Authorizer service ready"
    );

    server.serve(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
