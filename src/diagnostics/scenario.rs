// src/diagnostics/scenario.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named fault-injection checks a connection's diagnostics endpoint
/// understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    LatencySpike,
    Timeout,
    MalformedPayload,
    PermissionDenied,
    UpstreamOutage,
    Other,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::LatencySpike => "latency_spike",
            ScenarioKind::Timeout => "timeout",
            ScenarioKind::MalformedPayload => "malformed_payload",
            ScenarioKind::PermissionDenied => "permission_denied",
            ScenarioKind::UpstreamOutage => "upstream_outage",
            ScenarioKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Blocked` means the target never answered; `Fail` means it answered with
/// an error. Operators need the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Pass,
    Fail,
    Blocked,
}

/// Immutable record of one scenario execution within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticScenarioResult {
    pub scenario: ScenarioKind,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pass,
    Fail,
    Blocked,
}

/// Run-level aggregate. Only the constituent scenario results are persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsRunResult {
    pub status: RunStatus,
    pub results: Vec<DiagnosticScenarioResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Fail dominates, then blocked; an empty run never executed anything and is
/// blocked by definition.
pub fn aggregate(results: &[DiagnosticScenarioResult]) -> RunStatus {
    if results.is_empty() {
        return RunStatus::Blocked;
    }
    if results.iter().any(|r| r.status == ScenarioStatus::Fail) {
        return RunStatus::Fail;
    }
    if results.iter().any(|r| r.status == ScenarioStatus::Blocked) {
        return RunStatus::Blocked;
    }
    RunStatus::Pass
}
