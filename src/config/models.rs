// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat.failure_threshold == 0 {
            bail!("heartbeat.failure_threshold must be at least 1");
        }
        if self.heartbeat.retention_hours == 0 {
            bail!("heartbeat.retention_hours must be at least 1");
        }
        if self.heartbeat.sweep_interval_secs == 0 {
            bail!("heartbeat.sweep_interval_secs must be at least 1");
        }
        if self.heartbeat.probe_timeout_secs == 0 {
            bail!("heartbeat.probe_timeout_secs must be at least 1");
        }
        if self.diagnostics.scenario_timeout_ms == 0 {
            bail!("diagnostics.scenario_timeout_ms must be at least 1");
        }
        Ok(())
    }
}

/// Heartbeat pipeline settings. Threshold and retention default to the
/// documented policy (2 consecutive failures, 24 hour window) but remain
/// configuration inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl HeartbeatConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            retention_hours: default_retention_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_scenario_timeout_ms")]
    pub scenario_timeout_ms: u64,
}

impl DiagnosticsConfig {
    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_millis(self.scenario_timeout_ms)
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            scenario_timeout_ms: default_scenario_timeout_ms(),
        }
    }
}

/// A monitored connection as declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub url: String,
}

fn default_failure_threshold() -> usize {
    2
}

fn default_retention_hours() -> u64 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_scenario_timeout_ms() -> u64 {
    30_000
}
