// Logging initialization
//
// RUST_LOG takes priority over the configured level. Formats: pretty, compact, json.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::LoggingConfig;

/// Install a global subscriber for `config`.
///
/// Does nothing if a subscriber is already installed, so libraries and tests
/// embedding this crate keep their own.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = parse_log_level(&config.level)?;
        EnvFilter::new(level.as_str().to_lowercase())
    };

    let installed = match config.format.as_str() {
        "json" => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json()),
        ),
        "compact" => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact()),
        ),
        _ => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer()),
        ),
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already set, keeping it");
    }
    Ok(())
}

pub fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
