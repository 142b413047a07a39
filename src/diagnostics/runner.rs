// src/diagnostics/runner.rs
use super::ledger::ScenarioLedger;
use super::probe::{ProbeOutcome, ScenarioProbe, ScenarioRequest};
use super::scenario::{
    aggregate, DiagnosticScenarioResult, DiagnosticsRunResult, ScenarioKind, ScenarioStatus,
};
use crate::config::DiagnosticsConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

/// One requested diagnostics run against a connection's endpoint.
/// `timeout_ms` overrides the runner's configured per-scenario timeout when
/// set.
#[derive(Debug, Clone)]
pub struct DiagnosticsRequest {
    pub connection_id: String,
    pub team_id: String,
    pub endpoint_base: String,
    pub scenarios: Vec<ScenarioKind>,
    pub trigger: String,
    pub executed_by: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl DiagnosticsRequest {
    pub fn new(
        connection_id: impl Into<String>,
        team_id: impl Into<String>,
        endpoint_base: impl Into<String>,
        scenarios: Vec<ScenarioKind>,
        trigger: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            team_id: team_id.into(),
            endpoint_base: endpoint_base.into(),
            scenarios,
            trigger: trigger.into(),
            executed_by: None,
            timeout_ms: None,
        }
    }
}

/// Executes scenarios strictly in the caller-supplied order, one at a time,
/// each under its own cancellation timeout. Every scenario result is
/// persisted before the next scenario starts, so partial runs survive a
/// crashed caller.
pub struct DiagnosticsRunner {
    probe: Arc<dyn ScenarioProbe>,
    ledger: Arc<dyn ScenarioLedger>,
    config: DiagnosticsConfig,
}

impl DiagnosticsRunner {
    pub fn new(
        probe: Arc<dyn ScenarioProbe>,
        ledger: Arc<dyn ScenarioLedger>,
        config: DiagnosticsConfig,
    ) -> Self {
        Self {
            probe,
            ledger,
            config,
        }
    }

    pub async fn run(&self, request: &DiagnosticsRequest) -> DiagnosticsRunResult {
        let run_started = Utc::now();
        let run_id = Uuid::new_v4();
        let deadline = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.scenario_timeout());
        let timeout_ms = deadline.as_millis() as u64;
        let probe_request = ScenarioRequest {
            connection_id: request.connection_id.clone(),
            trigger: request.trigger.clone(),
            executed_by: request.executed_by.clone(),
        };

        let mut results = Vec::with_capacity(request.scenarios.len());
        for &scenario in &request.scenarios {
            let started_at = Utc::now();
            let begun = Instant::now();

            // Dropping the timed-out future cancels the in-flight request.
            let outcome = timeout(
                deadline,
                self.probe
                    .execute(&request.endpoint_base, scenario, &probe_request),
            )
            .await;
            let elapsed_ms = begun.elapsed().as_millis() as u64;

            let (status, notes, evidence) = match outcome {
                Err(_) => (
                    ScenarioStatus::Blocked,
                    format!("scenario {} timed out after {}ms", scenario, timeout_ms),
                    None,
                ),
                Ok(ProbeOutcome::Success { message }) => (
                    ScenarioStatus::Pass,
                    message.unwrap_or_else(|| format!("scenario {} passed", scenario)),
                    None,
                ),
                Ok(ProbeOutcome::HttpFailure {
                    status,
                    code,
                    message,
                    body,
                }) => {
                    let detail = match (code, message) {
                        (Some(code), Some(message)) => format!("{}: {}", code, message),
                        (Some(code), None) => code,
                        (None, Some(message)) => message,
                        (None, None) => body.clone(),
                    };
                    (
                        ScenarioStatus::Fail,
                        format!("scenario {} failed with HTTP {}: {}", scenario, status, detail),
                        Some(body),
                    )
                }
                Ok(ProbeOutcome::Transport { message }) => (
                    ScenarioStatus::Fail,
                    format!("scenario {} failed: {}", scenario, message),
                    None,
                ),
            };

            // A blocked scenario ran for the whole timeout; report the
            // configured bound rather than the few extra microseconds the
            // timer took to fire.
            let duration_ms = if status == ScenarioStatus::Blocked {
                elapsed_ms.min(timeout_ms)
            } else {
                elapsed_ms
            };

            let result = DiagnosticScenarioResult {
                scenario,
                status,
                duration_ms,
                started_at,
                completed_at: Utc::now(),
                notes,
            };
            debug!(
                "Scenario {} for connection {} finished: {:?} in {}ms",
                scenario, request.connection_id, result.status, result.duration_ms
            );

            if let Err(e) = self
                .ledger
                .record(&request.team_id, &request.connection_id, &result)
                .await
            {
                warn!(
                    "Failed to persist scenario {} result for connection {}: {}",
                    scenario, request.connection_id, e
                );
            }
            if let Some(body) = evidence.filter(|b| !b.is_empty()) {
                let filename = format!("{}-{}.txt", scenario, run_id);
                if let Err(e) = self
                    .ledger
                    .attach_evidence(
                        &request.team_id,
                        &request.connection_id,
                        &filename,
                        body.as_bytes(),
                    )
                    .await
                {
                    warn!(
                        "Failed to upload evidence for scenario {} on connection {}: {}",
                        scenario, request.connection_id, e
                    );
                }
            }

            results.push(result);
        }

        DiagnosticsRunResult {
            status: aggregate(&results),
            results,
            started_at: run_started,
            completed_at: Utc::now(),
        }
    }
}
