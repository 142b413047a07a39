// src/prober/sweep.rs
use super::directory::{Connection, ConnectionDirectory};
use crate::alerts::AlertEvaluator;
use crate::config::HeartbeatConfig;
use crate::history::{HealthState, HeartbeatSample, HeartbeatStatus, HistoryStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use url::Url;

/// Fixed liveness path probed on every connection's endpoint.
const LIVENESS_PATH: &str = "/rest/v1/";

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("connection metadata carries no usable endpoint URL")]
    MissingEndpoint,

    #[error("connection endpoint URL is malformed: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Resolve the canonical probe URL from a connection's endpoint metadata.
/// Accepts either a `supabaseUrl` or a generic `url` field and normalizes
/// the path to the liveness endpoint.
pub fn resolve_probe_url(metadata: &serde_json::Value) -> Result<Url, EndpointError> {
    let base = metadata
        .get("supabaseUrl")
        .and_then(|v| v.as_str())
        .or_else(|| metadata.get("url").and_then(|v| v.as_str()))
        .ok_or(EndpointError::MissingEndpoint)?;

    let mut url = Url::parse(base)?;
    url.set_path(LIVENESS_PATH);
    Ok(url)
}

/// Per-connection outcome of one sweep.
#[derive(Debug, Clone)]
pub struct HeartbeatResult {
    pub connection_id: String,
    pub team_id: String,
    pub status: HeartbeatStatus,
    pub latency_ms: Option<u64>,
    pub error_code: Option<String>,
    pub consecutive_failures: usize,
    pub snapshot_status: HealthState,
    pub status_changed: bool,
}

/// Orchestrates one sweep of liveness checks across the active connections
/// and feeds every result through the history store into the alert
/// evaluator. One connection's failure never aborts the sweep.
pub struct HeartbeatProber {
    config: HeartbeatConfig,
    directory: Arc<dyn ConnectionDirectory>,
    store: Arc<HistoryStore>,
    alerts: Arc<AlertEvaluator>,
    client: Client,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl HeartbeatProber {
    pub fn new(
        config: HeartbeatConfig,
        directory: Arc<dyn ConnectionDirectory>,
        store: Arc<HistoryStore>,
        alerts: Arc<AlertEvaluator>,
    ) -> Self {
        let client = Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .expect("Failed to create HTTP client");

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Self {
            config,
            directory,
            store,
            alerts,
            client,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Scheduled sweep loop; runs until `shutdown` is called.
    pub async fn start(self: Arc<Self>) {
        let mut interval = interval(self.config.sweep_interval());
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting heartbeat prober with interval: {:?}",
            self.config.sweep_interval()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_sweep(None, None).await {
                        error!("Heartbeat sweep failed: {}", e);
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Heartbeat prober shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One sweep over the given connections, defaulting to every active
    /// connection in the directory. Probes run in parallel tasks; each
    /// connection's history window is disjoint from the others'.
    pub async fn run_sweep(
        self: &Arc<Self>,
        connections: Option<Vec<Connection>>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<HeartbeatResult>> {
        let connections = match connections {
            Some(connections) => connections,
            None => self.directory.list_active_connections(None).await?,
        };

        let mut tasks = Vec::with_capacity(connections.len());
        for connection in connections {
            let prober = self.clone();
            tasks.push(tokio::spawn(async move {
                prober.probe_connection(connection, timestamp).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Heartbeat probe task panicked: {}", e),
            }
        }

        let failing = results
            .iter()
            .filter(|r| r.status == HeartbeatStatus::Fail)
            .count();
        info!(
            "Heartbeat sweep complete: {} healthy, {} failing",
            results.len() - failing,
            failing
        );
        Ok(results)
    }

    async fn probe_connection(
        &self,
        connection: Connection,
        timestamp: Option<DateTime<Utc>>,
    ) -> HeartbeatResult {
        let (status, latency_ms, error_code) = self.probe(&connection).await;

        if status == HeartbeatStatus::Fail {
            warn!(
                "Connection {} heartbeat failed: {:?}",
                connection.id, error_code
            );
        } else {
            debug!(
                "Connection {} heartbeat passed in {:?}ms",
                connection.id, latency_ms
            );
        }

        let record = self
            .store
            .record_heartbeat(
                &connection.team_id,
                &connection.id,
                HeartbeatSample {
                    status,
                    latency_ms,
                    error_code: error_code.clone(),
                    error_event_id: None,
                    occurred_at: timestamp,
                },
            )
            .await;

        if let Err(e) = self
            .alerts
            .evaluate(
                &connection.team_id,
                &connection.id,
                &connection.name,
                &record,
                error_code.as_deref(),
            )
            .await
        {
            warn!(
                "Alert evaluation failed for connection {}: {}",
                connection.id, e
            );
        }

        HeartbeatResult {
            connection_id: connection.id,
            team_id: connection.team_id,
            status,
            latency_ms,
            error_code,
            consecutive_failures: record.consecutive_failures,
            snapshot_status: record.snapshot.current_status,
            status_changed: record.had_status_change,
        }
    }

    /// The liveness check itself: a minimal HEAD request with wall-clock
    /// latency. Classification failures are data, never errors.
    async fn probe(
        &self,
        connection: &Connection,
    ) -> (HeartbeatStatus, Option<u64>, Option<String>) {
        let url = match resolve_probe_url(&connection.endpoint_metadata) {
            Ok(url) => url,
            Err(_) => {
                return (
                    HeartbeatStatus::Fail,
                    None,
                    Some("MISSING_ENDPOINT".to_string()),
                )
            }
        };

        let start = std::time::Instant::now();
        match self.client.head(url.as_str()).send().await {
            Ok(response) if response.status().is_success() => {
                let latency = start.elapsed().as_millis() as u64;
                (HeartbeatStatus::Pass, Some(latency), None)
            }
            Ok(response) => (
                HeartbeatStatus::Fail,
                None,
                Some(format!("HTTP_{}", response.status().as_u16())),
            ),
            Err(e) => (HeartbeatStatus::Fail, None, Some(transport_error_code(&e))),
        }
    }
}

fn transport_error_code(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "TIMEOUT".to_string()
    } else if error.is_connect() {
        "CONNECT_ERROR".to_string()
    } else {
        "REQUEST_ERROR".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::directory::{ConnectionStatus, StaticDirectory};
    use crate::alerts::{InMemoryIncidentLedger, InMemoryNotificationSink};
    use crate::history::InMemoryHeartbeatLedger;
    use serde_json::json;

    fn prober_with(connections: Vec<Connection>) -> Arc<HeartbeatProber> {
        let config = HeartbeatConfig::default();
        let store = Arc::new(HistoryStore::new(
            config.clone(),
            Arc::new(InMemoryHeartbeatLedger::new()),
        ));
        let alerts = Arc::new(AlertEvaluator::new(
            store.clone(),
            Arc::new(InMemoryIncidentLedger::new()),
            Arc::new(InMemoryNotificationSink::new()),
            config.failure_threshold,
        ));
        Arc::new(HeartbeatProber::new(
            config,
            Arc::new(StaticDirectory::new(connections)),
            store,
            alerts,
        ))
    }

    fn connection(id: &str, metadata: serde_json::Value) -> Connection {
        Connection {
            id: id.to_string(),
            team_id: "t1".to_string(),
            name: format!("Connection {}", id),
            status: ConnectionStatus::Active,
            endpoint_metadata: metadata,
        }
    }

    #[test]
    fn probe_url_prefers_supabase_url_and_normalizes_the_path() {
        let url = resolve_probe_url(&json!({
            "supabaseUrl": "https://abc.supabase.co/some/other/path",
            "url": "https://ignored.example.com",
        }))
        .unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/rest/v1/");

        let url = resolve_probe_url(&json!({ "url": "https://db.example.com" })).unwrap();
        assert_eq!(url.as_str(), "https://db.example.com/rest/v1/");

        assert!(matches!(
            resolve_probe_url(&json!({})),
            Err(EndpointError::MissingEndpoint)
        ));
        assert!(matches!(
            resolve_probe_url(&json!({ "url": "not a url" })),
            Err(EndpointError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_without_a_network_call() {
        let prober = prober_with(vec![]);
        let results = prober
            .run_sweep(Some(vec![connection("c1", json!({}))]), None)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, HeartbeatStatus::Fail);
        assert_eq!(results[0].error_code.as_deref(), Some("MISSING_ENDPOINT"));
        assert_eq!(results[0].snapshot_status, HealthState::Degraded);
        assert!(results[0].status_changed);
    }

    #[tokio::test]
    async fn reachable_endpoint_records_a_pass_with_latency() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/rest/v1/")
            .with_status(200)
            .create_async()
            .await;

        let prober = prober_with(vec![]);
        let results = prober
            .run_sweep(
                Some(vec![connection("c1", json!({ "url": server.url() }))]),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(results[0].status, HeartbeatStatus::Pass);
        assert!(results[0].latency_ms.is_some());
        assert_eq!(results[0].snapshot_status, HealthState::Active);
    }

    #[tokio::test]
    async fn http_error_status_becomes_the_error_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/rest/v1/")
            .with_status(503)
            .create_async()
            .await;

        let prober = prober_with(vec![]);
        let results = prober
            .run_sweep(
                Some(vec![connection("c1", json!({ "url": server.url() }))]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(results[0].status, HeartbeatStatus::Fail);
        assert_eq!(results[0].error_code.as_deref(), Some("HTTP_503"));
        assert_eq!(results[0].latency_ms, None);
    }

    #[tokio::test]
    async fn sweep_defaults_to_active_directory_connections() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/rest/v1/")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let active = connection("c1", json!({ "url": server.url() }));
        let mut paused = connection("c2", json!({ "url": server.url() }));
        paused.status = ConnectionStatus::Paused;

        let prober = prober_with(vec![active, paused]);
        let results = prober.run_sweep(None, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].connection_id, "c1");
    }
}
