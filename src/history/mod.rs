// src/history/mod.rs
mod event;
mod ledger;
mod store;

pub use event::{compute_snapshot, HealthSnapshot, HealthState, HeartbeatEvent, HeartbeatStatus};
pub use ledger::{HeartbeatLedger, InMemoryHeartbeatLedger};
pub use store::{HeartbeatRecord, HeartbeatSample, HistoryStore};
