//! PharmaHub notification server.
//!
//! Loads configuration, installs logging and runs the API server until a
//! shutdown signal arrives.

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt};

use pharmahub_core::config::{AppConfig, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("PHARMAHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("failed to load configuration")?;

    init_logging(&config.logging);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        %env,
        "Starting PharmaHub"
    );

    pharmahub_api::run_server(config)
        .await
        .context("server terminated with an error")?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init(),
        _ => fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init(),
    }
}
