//! firewall-gateway: HTTP host for the firewall operation registry

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use firewall_gateway::config::load_config;
use firewall_gateway::server::{serve, AppState};
use firewall_gateway::{OperationRegistry, SessionHost};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    info!("Firewall gateway starting...");
    info!("Provider API: {}", config.provider.api_base_url);

    let registry = Arc::new(OperationRegistry::with_builtin_operations());
    let host = Arc::new(SessionHost::new(config.provider.clone()));

    let fallback_token = config.auth.fallback_token();
    if fallback_token.is_some() {
        info!(
            "Fallback token configured from ${}",
            config.auth.fallback_token_env
        );
    }

    let state = AppState {
        host,
        registry,
        fallback_token,
    };

    serve(&config.server.listen_addr, state)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
