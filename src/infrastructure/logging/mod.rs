// Logging module - Logging infrastructure
use crate::domain::error::{BridgeError, BridgeResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    format!("rotbridge={},warn", level)
}

/// Initialize logging system
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless.
pub fn init_logging(level: &str, verbose: bool) -> BridgeResult<()> {
    let fallback = default_filter(level, verbose);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .map_err(|e| BridgeError::Config {
            message: format!("Invalid log level '{}': {}", level, e),
        })?;

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("RotBridge logging system initialized");
    }
    Ok(())
}
