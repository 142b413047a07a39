// src/alerts/mod.rs
mod evaluator;
mod incident;
mod notify;

pub use evaluator::{AlertDecision, AlertEvaluator};
pub use incident::{Incident, IncidentLedger, InMemoryIncidentLedger, Severity};
pub use notify::{
    Audience, InMemoryNotificationSink, LogNotificationSink, Notification, NotificationSink,
};
