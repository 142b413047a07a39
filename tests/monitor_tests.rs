// tests/monitor_tests.rs
//
// End-to-end coverage of the heartbeat pipeline and the diagnostics runner
// over the in-memory collaborator implementations.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Duration;

use connection_monitor::alerts::{
    AlertEvaluator, InMemoryIncidentLedger, InMemoryNotificationSink, Severity,
};
use connection_monitor::config::{DiagnosticsConfig, HeartbeatConfig};
use connection_monitor::diagnostics::{
    DiagnosticsRequest, DiagnosticsRunner, HttpScenarioProbe, InMemoryScenarioLedger, RunStatus,
    ScenarioKind, ScenarioStatus, SimulatedOutcome, SimulatedResponse, SimulatedScenarioProbe,
};
use connection_monitor::history::{
    HealthState, HeartbeatSample, HeartbeatStatus, HistoryStore, InMemoryHeartbeatLedger,
};

struct Pipeline {
    store: Arc<HistoryStore>,
    incidents: Arc<InMemoryIncidentLedger>,
    sink: Arc<InMemoryNotificationSink>,
    evaluator: AlertEvaluator,
}

fn pipeline() -> Pipeline {
    let store = Arc::new(HistoryStore::new(
        HeartbeatConfig::default(),
        Arc::new(InMemoryHeartbeatLedger::new()),
    ));
    let incidents = Arc::new(InMemoryIncidentLedger::new());
    let sink = Arc::new(InMemoryNotificationSink::new());
    let evaluator = AlertEvaluator::new(store.clone(), incidents.clone(), sink.clone(), 2);
    Pipeline {
        store,
        incidents,
        sink,
        evaluator,
    }
}

async fn heartbeat(
    pipeline: &Pipeline,
    status: HeartbeatStatus,
    latency_ms: Option<u64>,
    error_code: Option<&str>,
) {
    let record = pipeline
        .store
        .record_heartbeat(
            "t1",
            "C1",
            HeartbeatSample {
                status,
                latency_ms,
                error_code: error_code.map(str::to_string),
                ..Default::default()
            },
        )
        .await;
    pipeline
        .evaluator
        .evaluate("t1", "C1", "Primary DB", &record, error_code)
        .await
        .unwrap();
}

#[tokio::test]
async fn failing_connection_crosses_the_threshold_and_pages_once() {
    let pipeline = pipeline();

    heartbeat(&pipeline, HeartbeatStatus::Pass, Some(180), None).await;
    heartbeat(&pipeline, HeartbeatStatus::Fail, None, Some("TIMEOUT")).await;
    heartbeat(&pipeline, HeartbeatStatus::Fail, None, Some("TIMEOUT")).await;

    let snapshots = pipeline.store.snapshots_for_team("t1").await.unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.current_status, HealthState::Error);
    assert_eq!(snapshot.consecutive_failures, 2);
    assert_eq!(snapshot.uptime_percent_24h, 33.33);
    assert_eq!(snapshot.last_error_code.as_deref(), Some("TIMEOUT"));

    // Exactly one incident, linked back into the snapshot.
    assert_eq!(pipeline.incidents.incident_count(), 1);
    assert!(snapshot.last_error_event_id.is_some());

    // Later sweeps keep failing with error codes; the open incident is not
    // duplicated and nobody is paged again.
    heartbeat(&pipeline, HeartbeatStatus::Fail, None, Some("TIMEOUT")).await;
    heartbeat(&pipeline, HeartbeatStatus::Fail, None, Some("HTTP_503")).await;
    assert_eq!(pipeline.incidents.incident_count(), 1);

    let sent = pipeline.sink.sent().await;
    let critical: Vec<_> = sent
        .iter()
        .filter(|n| n.severity == Severity::Critical)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].kind, "service_error");
}

#[tokio::test]
async fn recovery_after_an_incident_notifies_without_closing_it() {
    let pipeline = pipeline();

    heartbeat(&pipeline, HeartbeatStatus::Fail, None, Some("HTTP_500")).await;
    heartbeat(&pipeline, HeartbeatStatus::Fail, None, Some("HTTP_500")).await;
    heartbeat(&pipeline, HeartbeatStatus::Pass, Some(95), None).await;

    let sent = pipeline.sink.sent().await;
    let kinds: Vec<_> = sent.iter().map(|n| n.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["service_degraded", "service_error", "service_recovered"]
    );

    // Recovery only signals observers; the incident stays until an operator
    // acknowledges it.
    assert_eq!(pipeline.incidents.incident_count(), 1);
    let snapshots = pipeline.store.snapshots_for_team("t1").await.unwrap();
    assert_eq!(snapshots[0].current_status, HealthState::Active);
}

#[tokio::test]
async fn diagnostics_run_with_a_hung_scenario_is_blocked() {
    let mut table = HashMap::new();
    table.insert(
        ScenarioKind::LatencySpike,
        SimulatedResponse {
            delay: Duration::ZERO,
            outcome: SimulatedOutcome::Success(Some("ok".to_string())),
        },
    );
    table.insert(
        ScenarioKind::Timeout,
        SimulatedResponse {
            delay: Duration::ZERO,
            outcome: SimulatedOutcome::NoResponse,
        },
    );

    let ledger = Arc::new(InMemoryScenarioLedger::new());
    let runner = DiagnosticsRunner::new(
        Arc::new(SimulatedScenarioProbe::new(table)),
        ledger.clone(),
        DiagnosticsConfig::default(),
    );

    let mut request = DiagnosticsRequest::new(
        "C1",
        "t1",
        "http://db.example.test",
        vec![ScenarioKind::LatencySpike, ScenarioKind::Timeout],
        "manual",
    );
    request.timeout_ms = Some(10);

    let run = runner.run(&request).await;
    assert_eq!(run.status, RunStatus::Blocked);
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[0].status, ScenarioStatus::Pass);
    assert_eq!(run.results[1].status, ScenarioStatus::Blocked);
    assert!(run.results[1].notes.contains("timed out"));

    let persisted = ledger.results_for("t1", "C1");
    assert_eq!(persisted.len(), 2);
}

#[tokio::test]
async fn http_probe_classifies_real_responses() {
    let mut server = mockito::Server::new_async().await;
    let pass = server
        .mock("POST", "/diagnostics/latency_spike")
        .with_status(200)
        .with_body(r#"{"message":"latency injection tolerated"}"#)
        .create_async()
        .await;
    let fail = server
        .mock("POST", "/diagnostics/permission_denied")
        .with_status(403)
        .with_body(r#"{"code":"PERMISSION_DENIED","message":"service role rejected"}"#)
        .create_async()
        .await;

    let ledger = Arc::new(InMemoryScenarioLedger::new());
    let runner = DiagnosticsRunner::new(
        Arc::new(HttpScenarioProbe::new()),
        ledger.clone(),
        DiagnosticsConfig::default(),
    );

    let request = DiagnosticsRequest::new(
        "C1",
        "t1",
        server.url(),
        vec![ScenarioKind::LatencySpike, ScenarioKind::PermissionDenied],
        "scheduled",
    );
    let run = runner.run(&request).await;

    pass.assert_async().await;
    fail.assert_async().await;

    assert_eq!(run.status, RunStatus::Fail);
    assert_eq!(run.results[0].status, ScenarioStatus::Pass);
    assert_eq!(run.results[0].notes, "latency injection tolerated");
    assert_eq!(run.results[1].status, ScenarioStatus::Fail);
    assert!(run.results[1].notes.contains("HTTP 403"));
    assert!(run.results[1].notes.contains("PERMISSION_DENIED"));

    // The failure body landed in the evidence store under the tenant key.
    let keys = ledger.evidence_keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("t1/C1/permission_denied-"));
}
