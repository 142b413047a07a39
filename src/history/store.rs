// src/history/store.rs
use super::event::{compute_snapshot, HealthSnapshot, HealthState, HeartbeatEvent, HeartbeatStatus};
use super::ledger::HeartbeatLedger;
use crate::config::HeartbeatConfig;
use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Input for one heartbeat recording. `occurred_at` defaults to now.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatSample {
    pub status: HeartbeatStatus,
    pub latency_ms: Option<u64>,
    pub error_code: Option<String>,
    pub error_event_id: Option<Uuid>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Outcome of recording one heartbeat, handed to the alert evaluator.
#[derive(Debug, Clone)]
pub struct HeartbeatRecord {
    pub heartbeat_id: Uuid,
    pub snapshot: HealthSnapshot,
    pub consecutive_failures: usize,
    pub had_status_change: bool,
    pub previous_status: Option<HealthState>,
}

struct ConnectionWindow {
    events: Vec<HeartbeatEvent>,
    snapshot: Option<HealthSnapshot>,
}

/// Rolling heartbeat window and derived snapshot per (team, connection) pair.
///
/// The in-memory view is the authoritative read path; the ledger is a
/// write-behind mirror. Each connection's window sits behind its own mutex so
/// concurrent sweeps for different connections never contend, while two
/// recordings for the same connection are serialized.
pub struct HistoryStore {
    config: HeartbeatConfig,
    windows: DashMap<(String, String), Arc<Mutex<ConnectionWindow>>>,
    ledger: Arc<dyn HeartbeatLedger>,
}

impl HistoryStore {
    pub fn new(config: HeartbeatConfig, ledger: Arc<dyn HeartbeatLedger>) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            ledger,
        }
    }

    /// Insert a heartbeat at the head of the connection's window, prune
    /// events past the retention horizon and recompute the snapshot.
    /// Computation cannot fail; ledger write failures are logged and the
    /// in-memory result stands.
    pub async fn record_heartbeat(
        &self,
        team_id: &str,
        connection_id: &str,
        sample: HeartbeatSample,
    ) -> HeartbeatRecord {
        let window = self.window(team_id, connection_id);
        let mut guard = window.lock().await;

        let event = HeartbeatEvent {
            id: Uuid::new_v4(),
            connection_id: connection_id.to_string(),
            team_id: team_id.to_string(),
            occurred_at: sample.occurred_at.unwrap_or_else(Utc::now),
            status: sample.status,
            latency_ms: sample.latency_ms,
            error_code: sample.error_code,
            error_event_id: sample.error_event_id,
        };
        let heartbeat_id = event.id;

        guard.events.insert(0, event.clone());
        let cutoff = Utc::now() - self.config.retention();
        guard.events.retain(|e| e.occurred_at >= cutoff);

        let previous_status = guard.snapshot.as_ref().map(|s| s.current_status);
        let snapshot = compute_snapshot(
            connection_id,
            &guard.events,
            self.config.failure_threshold,
        );
        // An absent snapshot means the vacuous initial state, which is active.
        let baseline = previous_status.unwrap_or(HealthState::Active);
        let had_status_change = baseline != snapshot.current_status;
        let consecutive_failures = snapshot.consecutive_failures;
        guard.snapshot = Some(snapshot.clone());

        if let Err(e) = self.ledger.append_event(&event).await {
            warn!(
                "Failed to mirror heartbeat {} for connection {}: {}",
                heartbeat_id, connection_id, e
            );
        }
        if let Err(e) = self.ledger.store_snapshot(team_id, &snapshot).await {
            warn!(
                "Failed to mirror snapshot for connection {}: {}",
                connection_id, e
            );
        }

        HeartbeatRecord {
            heartbeat_id,
            snapshot,
            consecutive_failures,
            had_status_change,
            previous_status,
        }
    }

    /// Latest snapshot per connection owned by the team. Served from the
    /// cache; a cold cache is hydrated from the ledger's persisted history.
    pub async fn snapshots_for_team(&self, team_id: &str) -> Result<Vec<HealthSnapshot>> {
        let cached: Vec<_> = self
            .windows
            .iter()
            .filter(|entry| entry.key().0 == team_id)
            .map(|entry| entry.value().clone())
            .collect();

        let windows = if cached.is_empty() {
            self.hydrate_team(team_id).await?
        } else {
            cached
        };

        let mut snapshots = Vec::with_capacity(windows.len());
        for window in windows {
            let guard = window.lock().await;
            if let Some(snapshot) = &guard.snapshot {
                snapshots.push(snapshot.clone());
            }
        }
        Ok(snapshots)
    }

    /// Attach an incident reference to an in-window heartbeat and republish
    /// the snapshot. Returns false when the heartbeat has already left the
    /// retention window.
    pub async fn link_to_error_event(
        &self,
        team_id: &str,
        connection_id: &str,
        heartbeat_id: Uuid,
        error_event_id: Uuid,
    ) -> bool {
        let window = self.window(team_id, connection_id);
        let mut guard = window.lock().await;

        let Some(event) = guard.events.iter_mut().find(|e| e.id == heartbeat_id) else {
            return false;
        };
        event.error_event_id = Some(error_event_id);

        let snapshot = compute_snapshot(
            connection_id,
            &guard.events,
            self.config.failure_threshold,
        );
        guard.snapshot = Some(snapshot.clone());

        if let Err(e) = self.ledger.link_error_event(heartbeat_id, error_event_id).await {
            warn!(
                "Failed to mirror incident link for heartbeat {}: {}",
                heartbeat_id, e
            );
        }
        if let Err(e) = self.ledger.store_snapshot(team_id, &snapshot).await {
            warn!(
                "Failed to mirror snapshot for connection {}: {}",
                connection_id, e
            );
        }
        true
    }

    fn window(&self, team_id: &str, connection_id: &str) -> Arc<Mutex<ConnectionWindow>> {
        self.windows
            .entry((team_id.to_string(), connection_id.to_string()))
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConnectionWindow {
                    events: Vec::new(),
                    snapshot: None,
                }))
            })
            .clone()
    }

    async fn hydrate_team(&self, team_id: &str) -> Result<Vec<Arc<Mutex<ConnectionWindow>>>> {
        let events = self.ledger.load_events(team_id).await?;
        let cutoff = Utc::now() - self.config.retention();

        let mut by_connection: HashMap<String, Vec<HeartbeatEvent>> = HashMap::new();
        for event in events {
            if event.occurred_at >= cutoff {
                by_connection
                    .entry(event.connection_id.clone())
                    .or_default()
                    .push(event);
            }
        }

        let mut hydrated = Vec::with_capacity(by_connection.len());
        for (connection_id, mut events) in by_connection {
            events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
            let snapshot =
                compute_snapshot(&connection_id, &events, self.config.failure_threshold);
            let window = self.window(team_id, &connection_id);
            let mut guard = window.lock().await;
            guard.events = events;
            guard.snapshot = Some(snapshot);
            drop(guard);
            hydrated.push(window);
        }
        Ok(hydrated)
    }
}
