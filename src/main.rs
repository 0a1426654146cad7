//! Bounty Board Health monitor
//!
//! Run with: cargo run
//!
//! See `bounty_health::config` for the BOUNTY_HEALTH_* environment variables.
//! RUST_LOG sets the log level (default: info).

use bounty_health::api::run_server;
use bounty_health::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bounty_health=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env();

    tracing::info!("Bounty Board Health configuration:");
    tracing::info!("  Monitoring: {}", config.base_url);
    tracing::info!("  Listen: {}:{}", config.host, config.port);
    tracing::info!("  Poll interval: {:?}", config.poll_interval);
    tracing::info!("  History file: {}", config.history_file.display());
    tracing::info!("  Endpoints: {}", config.endpoints.join(", "));
    if config.webhook_url.is_some() {
        tracing::info!("  Alert webhook: configured");
    } else {
        tracing::info!("  Alert webhook: DISABLED (alerts are logged only)");
    }

    run_server(config).await
}
