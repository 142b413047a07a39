// src/alerts/incident.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Operator-facing incident record. Owned by the incident ledger; the
/// evaluator only creates and acknowledges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub team_id: String,
    pub connection_id: String,
    pub severity: Severity,
    pub message: String,
    pub correlation_id: Uuid,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

#[async_trait]
pub trait IncidentLedger: Send + Sync {
    async fn create(&self, incident: Incident) -> Result<Incident>;

    async fn get(&self, id: Uuid) -> Result<Option<Incident>>;

    /// Sets the acknowledgement timestamp and actor. Returns None for an
    /// unknown incident.
    async fn acknowledge(
        &self,
        id: Uuid,
        operator_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>>;
}

#[derive(Default)]
pub struct InMemoryIncidentLedger {
    incidents: DashMap<Uuid, Incident>,
}

impl InMemoryIncidentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incident_count(&self) -> usize {
        self.incidents.len()
    }
}

#[async_trait]
impl IncidentLedger for InMemoryIncidentLedger {
    async fn create(&self, incident: Incident) -> Result<Incident> {
        self.incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>> {
        Ok(self.incidents.get(&id).map(|i| i.clone()))
    }

    async fn acknowledge(
        &self,
        id: Uuid,
        operator_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>> {
        let Some(mut incident) = self.incidents.get_mut(&id) else {
            return Ok(None);
        };
        incident.acknowledged_at = Some(at);
        incident.acknowledged_by = Some(operator_id.to_string());
        Ok(Some(incident.clone()))
    }
}
