// src/alerts/notify.rs
use super::incident::Severity;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Audience {
    pub team_id: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: String,
    pub severity: Severity,
    pub channel: String,
    pub audience: Audience,
    pub context: serde_json::Value,
}

/// Fire-and-forget delivery seam. Delivery failures are the transport's
/// problem; callers log and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<()>;
}

/// Sink that emits notifications to the process log, used by the standalone
/// binary.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        match notification.severity {
            Severity::Info => info!(
                "[{}] {} -> team {}: {}",
                notification.channel,
                notification.kind,
                notification.audience.team_id,
                notification.context
            ),
            Severity::Warning => warn!(
                "[{}] {} -> team {}: {}",
                notification.channel,
                notification.kind,
                notification.audience.team_id,
                notification.context
            ),
            Severity::Critical => error!(
                "[{}] {} -> team {}: {}",
                notification.channel,
                notification.kind,
                notification.audience.team_id,
                notification.context
            ),
        }
        Ok(())
    }
}

/// Captures dispatched notifications for assertions.
#[derive(Default)]
pub struct InMemoryNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
