// src/prober/directory.rs
use crate::config::ConnectionEntry;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Paused,
    Archived,
}

/// A registered service connection as the directory exposes it. The monitor
/// only reads active rows and the endpoint metadata blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub status: ConnectionStatus,
    pub endpoint_metadata: serde_json::Value,
}

impl Connection {
    pub fn from_entry(entry: &ConnectionEntry) -> Self {
        Self {
            id: entry.id.clone(),
            team_id: entry.team_id.clone(),
            name: entry.name.clone(),
            status: ConnectionStatus::Active,
            endpoint_metadata: json!({ "url": entry.url }),
        }
    }
}

#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    async fn list_active_connections(&self, team_id: Option<&str>) -> Result<Vec<Connection>>;

    async fn get_connection(&self, team_id: &str, id: &str) -> Result<Option<Connection>>;
}

/// Directory backed by a fixed connection list, used by the standalone
/// binary (config-declared connections) and by tests.
pub struct StaticDirectory {
    connections: Vec<Connection>,
}

impl StaticDirectory {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl ConnectionDirectory for StaticDirectory {
    async fn list_active_connections(&self, team_id: Option<&str>) -> Result<Vec<Connection>> {
        Ok(self
            .connections
            .iter()
            .filter(|c| c.status == ConnectionStatus::Active)
            .filter(|c| team_id.map_or(true, |t| c.team_id == t))
            .cloned()
            .collect())
    }

    async fn get_connection(&self, team_id: &str, id: &str) -> Result<Option<Connection>> {
        Ok(self
            .connections
            .iter()
            .find(|c| c.team_id == team_id && c.id == id)
            .cloned())
    }
}
