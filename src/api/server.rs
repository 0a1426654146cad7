use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{dashboard, health_check, history, not_found, status, AppState};
use crate::alerts::{AlertGate, Notifier};
use crate::config::MonitorConfig;
use crate::history::{HistoryStore, JsonFileStore};
use crate::probe::Prober;
use crate::scheduler::Scheduler;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Dashboard
        .route("/", get(dashboard))
        .route("/dashboard", get(dashboard))
        // JSON API
        .route("/api/status", get(status))
        .route("/api/history", get(history))
        .route("/api/health", get(health_check))
        .fallback(not_found)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Load history, start the scheduler and serve HTTP until Ctrl-C
pub async fn run_server(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let persistence = Arc::new(JsonFileStore::new(&config.history_file));
    let store = Arc::new(HistoryStore::load(persistence));

    let prober = Prober::new(config.base_url.clone()).with_timeout(config.probe_timeout);
    let gate = AlertGate::new(Notifier::new(config.webhook_url.clone()))
        .with_cooldown(chrono::Duration::from_std(config.alert_cooldown)?)
        .with_slow_threshold_ms(config.slow_threshold_ms);

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        prober,
        gate,
        config.endpoints.clone(),
        config.poll_interval,
    ));
    let scheduler_handle = Arc::clone(&scheduler).start();

    let state = Arc::new(AppState {
        store: Arc::clone(&store),
        base_url: config.base_url.clone(),
        endpoint_count: scheduler.endpoints().len(),
    });
    let app = build_router(state);

    let listener = bind_listener(&config.host, config.port).await?;
    tracing::info!("Starting health monitor on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&scheduler)))
        .await?;

    // Let an in-flight cycle finish so its results are not lost
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }

    if let Err(e) = store.persist() {
        tracing::error!(error = %e, "Failed to persist check history on shutdown");
    }

    tracing::info!("Health monitor stopped");
    Ok(())
}

/// Bind the HTTP listener. `host` may be a hostname, an IPv4 address or a
/// bare IPv6 address.
async fn bind_listener(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

async fn shutdown_signal(scheduler: Arc<Scheduler>) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");

    tracing::info!("Shutdown signal received, stopping scheduler...");
    scheduler.stop();
}
