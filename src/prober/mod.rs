// src/prober/mod.rs
mod directory;
mod sweep;

pub use directory::{Connection, ConnectionDirectory, ConnectionStatus, StaticDirectory};
pub use sweep::{resolve_probe_url, EndpointError, HeartbeatProber, HeartbeatResult};
