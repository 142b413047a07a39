// src/alerts/evaluator.rs
use super::incident::{Incident, IncidentLedger, Severity};
use super::notify::{Audience, Notification, NotificationSink};
use crate::history::{HealthState, HeartbeatRecord, HistoryStore};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// What the evaluator decided for one heartbeat outcome.
#[derive(Debug, Clone, Default)]
pub struct AlertDecision {
    pub created_incident: Option<Incident>,
    pub resolved: bool,
}

/// Translates a heartbeat outcome plus its derived snapshot into
/// incident-lifecycle actions. Hysteresis lives here: nobody is paged before
/// the consecutive-failure threshold is crossed, and an already-paged
/// connection is not paged again.
pub struct AlertEvaluator {
    store: Arc<HistoryStore>,
    incidents: Arc<dyn IncidentLedger>,
    notifier: Arc<dyn NotificationSink>,
    failure_threshold: usize,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<HistoryStore>,
        incidents: Arc<dyn IncidentLedger>,
        notifier: Arc<dyn NotificationSink>,
        failure_threshold: usize,
    ) -> Self {
        Self {
            store,
            incidents,
            notifier,
            failure_threshold,
        }
    }

    pub async fn evaluate(
        &self,
        team_id: &str,
        connection_id: &str,
        connection_name: &str,
        outcome: &HeartbeatRecord,
        error_code: Option<&str>,
    ) -> Result<AlertDecision> {
        match outcome.snapshot.current_status {
            HealthState::Error if outcome.consecutive_failures >= self.failure_threshold => {
                let already_paged = outcome.snapshot.last_error_event_id.is_some()
                    && outcome.previous_status == Some(HealthState::Error);
                if already_paged {
                    return Ok(AlertDecision::default());
                }
                let incident = self
                    .open_incident(team_id, connection_id, connection_name, outcome, error_code)
                    .await?;
                Ok(AlertDecision {
                    created_incident: Some(incident),
                    resolved: false,
                })
            }
            HealthState::Degraded
                if outcome.previous_status != Some(HealthState::Degraded) =>
            {
                self.dispatch(Notification {
                    kind: "service_degraded".into(),
                    severity: Severity::Warning,
                    channel: "ops".into(),
                    audience: operations_audience(team_id),
                    context: json!({
                        "connectionId": connection_id,
                        "connectionName": connection_name,
                        "consecutiveFailures": outcome.consecutive_failures,
                        "errorCode": error_code,
                    }),
                })
                .await;
                Ok(AlertDecision::default())
            }
            HealthState::Active
                if matches!(outcome.previous_status, Some(p) if p != HealthState::Active) =>
            {
                self.dispatch(Notification {
                    kind: "service_recovered".into(),
                    severity: Severity::Info,
                    channel: "ops".into(),
                    audience: operations_audience(team_id),
                    context: json!({
                        "connectionId": connection_id,
                        "connectionName": connection_name,
                        "uptimePercent24h": outcome.snapshot.uptime_percent_24h,
                    }),
                })
                .await;
                Ok(AlertDecision {
                    created_incident: None,
                    resolved: true,
                })
            }
            _ => Ok(AlertDecision::default()),
        }
    }

    /// Tenant-checked acknowledgement. Returns None when the incident does
    /// not exist or belongs to another team.
    pub async fn acknowledge(
        &self,
        team_id: &str,
        incident_id: Uuid,
        operator_id: &str,
    ) -> Result<Option<Incident>> {
        let Some(incident) = self.incidents.get(incident_id).await? else {
            return Ok(None);
        };
        if incident.team_id != team_id {
            return Ok(None);
        }

        let acknowledged = self
            .incidents
            .acknowledge(incident_id, operator_id, Utc::now())
            .await?;
        if let Some(incident) = &acknowledged {
            self.dispatch(Notification {
                kind: "incident_acknowledged".into(),
                severity: Severity::Info,
                channel: "ops".into(),
                audience: operations_audience(team_id),
                context: json!({
                    "incidentId": incident.id,
                    "connectionId": incident.connection_id,
                    "acknowledgedBy": operator_id,
                }),
            })
            .await;
        }
        Ok(acknowledged)
    }

    async fn open_incident(
        &self,
        team_id: &str,
        connection_id: &str,
        connection_name: &str,
        outcome: &HeartbeatRecord,
        error_code: Option<&str>,
    ) -> Result<Incident> {
        let incident = Incident {
            id: Uuid::new_v4(),
            team_id: team_id.to_string(),
            connection_id: connection_id.to_string(),
            severity: Severity::Critical,
            message: format!(
                "Connection {} is failing: {} consecutive heartbeat failures",
                connection_name, outcome.consecutive_failures
            ),
            correlation_id: Uuid::new_v4(),
            context: json!({
                "heartbeatId": outcome.heartbeat_id,
                "consecutiveFailures": outcome.consecutive_failures,
                "errorCode": error_code,
            }),
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
        };
        let incident = self
            .incidents
            .create(incident)
            .await
            .context("Failed to open incident")?;

        self.store
            .link_to_error_event(team_id, connection_id, outcome.heartbeat_id, incident.id)
            .await;

        self.dispatch(Notification {
            kind: "service_error".into(),
            severity: Severity::Critical,
            channel: "ops".into(),
            audience: operations_audience(team_id),
            context: json!({
                "incidentId": incident.id,
                "connectionId": connection_id,
                "connectionName": connection_name,
                "consecutiveFailures": outcome.consecutive_failures,
                "errorCode": error_code,
            }),
        })
        .await;

        Ok(incident)
    }

    async fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.notifier.dispatch(notification).await {
            warn!("Notification dispatch failed: {}", e);
        }
    }
}

fn operations_audience(team_id: &str) -> Audience {
    Audience {
        team_id: team_id.to_string(),
        roles: vec!["owner".to_string(), "admin".to_string()],
    }
}
