// src/diagnostics/probe.rs
use super::scenario::ScenarioKind;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

/// Payload carried by every scenario request.
#[derive(Debug, Clone)]
pub struct ScenarioRequest {
    pub connection_id: String,
    pub trigger: String,
    pub executed_by: Option<String>,
}

/// Raw outcome of one scenario probe, before the runner classifies it.
/// Transport problems are data here, not errors.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Success {
        message: Option<String>,
    },
    HttpFailure {
        status: u16,
        code: Option<String>,
        message: Option<String>,
        body: String,
    },
    Transport {
        message: String,
    },
}

/// Seam between the runner and the network. The runner's timeout wraps
/// `execute`; dropping the future must cancel any in-flight request, which
/// reqwest guarantees.
#[async_trait]
pub trait ScenarioProbe: Send + Sync {
    async fn execute(
        &self,
        endpoint_base: &str,
        scenario: ScenarioKind,
        request: &ScenarioRequest,
    ) -> ProbeOutcome;
}

/// Probe that POSTs `{endpointBase}/diagnostics/{scenario}` with the
/// standard `{connectionId, trigger, executedBy}` body.
pub struct HttpScenarioProbe {
    client: Client,
}

impl HttpScenarioProbe {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpScenarioProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScenarioProbe for HttpScenarioProbe {
    async fn execute(
        &self,
        endpoint_base: &str,
        scenario: ScenarioKind,
        request: &ScenarioRequest,
    ) -> ProbeOutcome {
        let url = format!(
            "{}/diagnostics/{}",
            endpoint_base.trim_end_matches('/'),
            scenario
        );
        let body = json!({
            "connectionId": request.connection_id,
            "trigger": request.trigger,
            "executedBy": request.executed_by,
        });

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                return ProbeOutcome::Transport {
                    message: e.to_string(),
                }
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<serde_json::Value> = serde_json::from_str(&text).ok();

        if status.is_success() {
            let message = parsed.as_ref().and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .or_else(|| v.get("status").and_then(|s| s.as_str()))
                    .map(str::to_string)
            });
            ProbeOutcome::Success { message }
        } else {
            let code = parsed
                .as_ref()
                .and_then(|v| v.get("code").and_then(|c| c.as_str()))
                .map(str::to_string);
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()))
                .map(str::to_string);
            ProbeOutcome::HttpFailure {
                status: status.as_u16(),
                code,
                message,
                body: text,
            }
        }
    }
}

/// Synthetic response for one scenario in the simulated probe's table.
#[derive(Debug, Clone)]
pub struct SimulatedResponse {
    pub delay: Duration,
    pub outcome: SimulatedOutcome,
}

#[derive(Debug, Clone)]
pub enum SimulatedOutcome {
    Success(Option<String>),
    HttpFailure {
        status: u16,
        code: String,
        message: String,
    },
    Transport(String),
    /// Never answers; the runner's timeout classifies it as blocked.
    NoResponse,
}

/// Deterministic offline probe. The runner's classification, persistence and
/// aggregation are identical to the HTTP probe's path.
pub struct SimulatedScenarioProbe {
    table: HashMap<ScenarioKind, SimulatedResponse>,
}

impl SimulatedScenarioProbe {
    pub fn new(table: HashMap<ScenarioKind, SimulatedResponse>) -> Self {
        Self { table }
    }

    pub fn with_defaults() -> Self {
        let mut table = HashMap::new();
        table.insert(
            ScenarioKind::LatencySpike,
            SimulatedResponse {
                delay: Duration::from_millis(120),
                outcome: SimulatedOutcome::Success(Some(
                    "responded after injected latency".to_string(),
                )),
            },
        );
        table.insert(
            ScenarioKind::Timeout,
            SimulatedResponse {
                delay: Duration::ZERO,
                outcome: SimulatedOutcome::NoResponse,
            },
        );
        table.insert(
            ScenarioKind::MalformedPayload,
            SimulatedResponse {
                delay: Duration::from_millis(5),
                outcome: SimulatedOutcome::HttpFailure {
                    status: 422,
                    code: "MALFORMED_PAYLOAD".to_string(),
                    message: "payload failed validation".to_string(),
                },
            },
        );
        table.insert(
            ScenarioKind::PermissionDenied,
            SimulatedResponse {
                delay: Duration::from_millis(5),
                outcome: SimulatedOutcome::HttpFailure {
                    status: 403,
                    code: "PERMISSION_DENIED".to_string(),
                    message: "service role rejected the request".to_string(),
                },
            },
        );
        table.insert(
            ScenarioKind::UpstreamOutage,
            SimulatedResponse {
                delay: Duration::from_millis(5),
                outcome: SimulatedOutcome::Transport(
                    "connection refused by upstream".to_string(),
                ),
            },
        );
        table.insert(
            ScenarioKind::Other,
            SimulatedResponse {
                delay: Duration::from_millis(5),
                outcome: SimulatedOutcome::Success(None),
            },
        );
        Self::new(table)
    }
}

#[async_trait]
impl ScenarioProbe for SimulatedScenarioProbe {
    async fn execute(
        &self,
        _endpoint_base: &str,
        scenario: ScenarioKind,
        _request: &ScenarioRequest,
    ) -> ProbeOutcome {
        let Some(entry) = self.table.get(&scenario) else {
            return ProbeOutcome::Transport {
                message: format!("no simulated outcome for scenario {}", scenario),
            };
        };

        sleep(entry.delay).await;
        match &entry.outcome {
            SimulatedOutcome::Success(message) => ProbeOutcome::Success {
                message: message.clone(),
            },
            SimulatedOutcome::HttpFailure {
                status,
                code,
                message,
            } => ProbeOutcome::HttpFailure {
                status: *status,
                code: Some(code.clone()),
                message: Some(message.clone()),
                body: format!("{{\"code\":\"{}\",\"message\":\"{}\"}}", code, message),
            },
            SimulatedOutcome::Transport(message) => ProbeOutcome::Transport {
                message: message.clone(),
            },
            SimulatedOutcome::NoResponse => std::future::pending().await,
        }
    }
}
