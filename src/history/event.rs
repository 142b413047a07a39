// src/history/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a single liveness probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    #[default]
    Pass,
    Fail,
}

/// Derived health state for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Active,
    Degraded,
    Error,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthState::Active => "active",
            HealthState::Degraded => "degraded",
            HealthState::Error => "error",
        };
        f.write_str(s)
    }
}

/// One heartbeat probe result. Append-only; the only later mutation is
/// attaching the incident reference once an alert is opened for this failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    pub id: Uuid,
    pub connection_id: String,
    pub team_id: String,
    pub occurred_at: DateTime<Utc>,
    pub status: HeartbeatStatus,
    pub latency_ms: Option<u64>,
    pub error_code: Option<String>,
    pub error_event_id: Option<Uuid>,
}

/// Current health summary for a connection, recomputed wholesale from its
/// event window on every new heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub connection_id: String,
    pub current_status: HealthState,
    pub uptime_percent_24h: f64,
    pub recent_failures: usize,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub last_latency_ms: Option<u64>,
    pub consecutive_failures: usize,
    pub last_error_event_id: Option<Uuid>,
    pub last_error_code: Option<String>,
}

/// Pure snapshot computation over an already-pruned window, newest event
/// first. `failure_threshold` is the consecutive-failure count at which a
/// failing connection is considered in error rather than degraded.
pub fn compute_snapshot(
    connection_id: &str,
    events: &[HeartbeatEvent],
    failure_threshold: usize,
) -> HealthSnapshot {
    let total = events.len();
    let passes = events
        .iter()
        .filter(|e| e.status == HeartbeatStatus::Pass)
        .count();

    let uptime_percent_24h = if total == 0 {
        100.0
    } else {
        round2(passes as f64 / total as f64 * 100.0)
    };

    let consecutive_failures = events
        .iter()
        .take_while(|e| e.status == HeartbeatStatus::Fail)
        .count();

    let current_status = match events.first() {
        None => HealthState::Active,
        Some(newest) if newest.status == HeartbeatStatus::Pass => HealthState::Active,
        Some(_) if consecutive_failures >= failure_threshold => HealthState::Error,
        Some(_) => HealthState::Degraded,
    };

    // Scanned independently: nearly every failing heartbeat carries an error
    // code, but only the one the evaluator linked carries an incident id. A
    // combined scan would let a code-only fail shadow the linked incident.
    let last_error_event_id = events
        .iter()
        .find(|e| e.status == HeartbeatStatus::Fail && e.error_event_id.is_some())
        .and_then(|e| e.error_event_id);
    let last_error_code = events
        .iter()
        .find(|e| e.status == HeartbeatStatus::Fail && e.error_code.is_some())
        .and_then(|e| e.error_code.clone());

    HealthSnapshot {
        connection_id: connection_id.to_string(),
        current_status,
        uptime_percent_24h,
        recent_failures: total - passes,
        last_heartbeat_at: events.first().map(|e| e.occurred_at),
        last_latency_ms: events.first().and_then(|e| e.latency_ms),
        consecutive_failures,
        last_error_event_id,
        last_error_code,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
