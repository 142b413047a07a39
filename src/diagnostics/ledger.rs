// src/diagnostics/ledger.rs
use super::scenario::DiagnosticScenarioResult;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Durable store for scenario results, with an optional evidence blob keyed
/// `{team}/{connection}/{filename}`. Write failures are logged by the runner
/// and never abort a run.
#[async_trait]
pub trait ScenarioLedger: Send + Sync {
    async fn record(
        &self,
        team_id: &str,
        connection_id: &str,
        result: &DiagnosticScenarioResult,
    ) -> Result<()>;

    async fn attach_evidence(
        &self,
        team_id: &str,
        connection_id: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryScenarioLedger {
    results: DashMap<(String, String), Vec<DiagnosticScenarioResult>>,
    evidence: DashMap<String, Vec<u8>>,
}

impl InMemoryScenarioLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results_for(&self, team_id: &str, connection_id: &str) -> Vec<DiagnosticScenarioResult> {
        self.results
            .get(&(team_id.to_string(), connection_id.to_string()))
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn evidence_keys(&self) -> Vec<String> {
        self.evidence.iter().map(|e| e.key().clone()).collect()
    }
}

#[async_trait]
impl ScenarioLedger for InMemoryScenarioLedger {
    async fn record(
        &self,
        team_id: &str,
        connection_id: &str,
        result: &DiagnosticScenarioResult,
    ) -> Result<()> {
        self.results
            .entry((team_id.to_string(), connection_id.to_string()))
            .or_default()
            .push(result.clone());
        Ok(())
    }

    async fn attach_evidence(
        &self,
        team_id: &str,
        connection_id: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<()> {
        let key = format!("{}/{}/{}", team_id, connection_id, filename);
        self.evidence.insert(key, contents.to_vec());
        Ok(())
    }
}
