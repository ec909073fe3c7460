//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the configured
//! level when it is set.
//!
//! Secrets never reach the logs: credentials only expose their username through
//! `Debug`, and tokens are not logged at all.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::config::LoggingConfig;
use crate::core::error::{AuthorizerError, AuthorizerResult};

/// Install the subscriber described by `config`.
///
/// Calling this again after a subscriber is installed (common in tests) only logs a
/// warning.
pub fn init_logging(config: &LoggingConfig) -> AuthorizerResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AuthorizerError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let result = match config.format.to_lowercase().as_str() {
        "pretty" => Registry::default()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
        "json" => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init(),
        other => {
            return Err(AuthorizerError::config(format!(
                "Unsupported log format: {}",
                other
            )))
        }
    };

    if result.is_err() {
        tracing::warn!("Tracing subscriber already initialized, skipping initialization");
    }

    tracing::info!(level = %config.level, format = %config.format, "Structured logging initialized");
    Ok(())
}
