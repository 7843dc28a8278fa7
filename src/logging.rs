//! Tracing initialization.
//!
//! Installs a `tracing-subscriber` fmt layer with environment-based
//! filtering. `RUST_LOG` overrides the configured directive, so a deployment
//! can raise verbosity without touching the settings file.

use crate::error::{AppResult, ProbeError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with the "info" default directive.
pub fn init() -> AppResult<()> {
    init_with_directive("info")
}

/// Initialize tracing with the given default filter directive.
pub fn init_with_directive(directive: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .map_err(|err| ProbeError::Configuration(format!("invalid log directive: {err}")))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|err| ProbeError::Configuration(format!("tracing init failed: {err}")))
}
