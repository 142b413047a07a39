// src/diagnostics/mod.rs
mod ledger;
mod probe;
mod runner;
mod scenario;

pub use ledger::{InMemoryScenarioLedger, ScenarioLedger};
pub use probe::{
    HttpScenarioProbe, ProbeOutcome, ScenarioProbe, ScenarioRequest, SimulatedOutcome,
    SimulatedResponse, SimulatedScenarioProbe,
};
pub use runner::{DiagnosticsRequest, DiagnosticsRunner};
pub use scenario::{
    aggregate, DiagnosticScenarioResult, DiagnosticsRunResult, RunStatus, ScenarioKind,
    ScenarioStatus,
};
