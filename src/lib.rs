// src/lib.rs
pub mod alerts;
pub mod config;
pub mod diagnostics;
pub mod history;
pub mod prober;
