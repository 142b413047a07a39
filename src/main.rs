// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use connection_monitor::{
    alerts::{AlertEvaluator, InMemoryIncidentLedger, LogNotificationSink},
    config,
    history::{HistoryStore, InMemoryHeartbeatLedger},
    prober::{Connection, HeartbeatProber, StaticDirectory},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("connection_monitor=debug".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // The standalone binary mirrors to in-memory ledgers and logs its
    // notifications; deployments supply durable ledger and sink
    // implementations through the same traits.
    let store = Arc::new(HistoryStore::new(
        config.heartbeat.clone(),
        Arc::new(InMemoryHeartbeatLedger::new()),
    ));
    let evaluator = Arc::new(AlertEvaluator::new(
        store.clone(),
        Arc::new(InMemoryIncidentLedger::new()),
        Arc::new(LogNotificationSink),
        config.heartbeat.failure_threshold,
    ));
    let directory = Arc::new(StaticDirectory::new(
        config.connections.iter().map(Connection::from_entry).collect(),
    ));

    let prober = Arc::new(HeartbeatProber::new(
        config.heartbeat.clone(),
        directory,
        store,
        evaluator,
    ));

    info!(
        "Monitoring {} connection(s) every {}s",
        config.connections.len(),
        config.heartbeat.sweep_interval_secs
    );
    let runner = prober.clone();
    let sweep_task = tokio::spawn(async move { runner.start().await });

    shutdown_signal().await;
    prober.shutdown();
    let _ = sweep_task.await;

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
