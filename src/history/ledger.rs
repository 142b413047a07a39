// src/history/ledger.rs
use super::event::{HealthSnapshot, HeartbeatEvent};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Durable mirror of the in-memory heartbeat history. The store treats it as
/// write-behind: failures are logged by the caller and never roll back the
/// in-memory state.
#[async_trait]
pub trait HeartbeatLedger: Send + Sync {
    async fn append_event(&self, event: &HeartbeatEvent) -> Result<()>;

    async fn store_snapshot(&self, team_id: &str, snapshot: &HealthSnapshot) -> Result<()>;

    async fn link_error_event(&self, heartbeat_id: Uuid, error_event_id: Uuid) -> Result<()>;

    /// All retained events for a team, used to hydrate a cold cache.
    async fn load_events(&self, team_id: &str) -> Result<Vec<HeartbeatEvent>>;
}

/// Map-backed ledger for tests and the standalone binary.
#[derive(Default)]
pub struct InMemoryHeartbeatLedger {
    events: DashMap<Uuid, HeartbeatEvent>,
    snapshots: DashMap<(String, String), HealthSnapshot>,
}

impl InMemoryHeartbeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn snapshot_for(&self, team_id: &str, connection_id: &str) -> Option<HealthSnapshot> {
        self.snapshots
            .get(&(team_id.to_string(), connection_id.to_string()))
            .map(|s| s.clone())
    }
}

#[async_trait]
impl HeartbeatLedger for InMemoryHeartbeatLedger {
    async fn append_event(&self, event: &HeartbeatEvent) -> Result<()> {
        self.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn store_snapshot(&self, team_id: &str, snapshot: &HealthSnapshot) -> Result<()> {
        self.snapshots.insert(
            (team_id.to_string(), snapshot.connection_id.clone()),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn link_error_event(&self, heartbeat_id: Uuid, error_event_id: Uuid) -> Result<()> {
        if let Some(mut event) = self.events.get_mut(&heartbeat_id) {
            event.error_event_id = Some(error_event_id);
        }
        Ok(())
    }

    async fn load_events(&self, team_id: &str) -> Result<Vec<HeartbeatEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.team_id == team_id)
            .map(|e| e.clone())
            .collect())
    }
}
