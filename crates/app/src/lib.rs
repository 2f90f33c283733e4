//! # domisafe-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `Sensor` — one pollable sensor
//!   - `Actuator` — switch a device on or off
//!   - `Camera` — capture an attachment for a motion event
//!   - `RecordLog` — date-partitioned local log
//!   - `FallbackStore` — durable queue of unconfirmed records
//!   - `Transport` — remote broker session
//! - Define the **use-case services**:
//!   - `SensorReader` — poll with a deadline, never raise
//!   - `EventClassifier` — motion debounce and attachment capture
//!   - `RemotePublisher` — connection state machine, backoff and replay
//!   - `Orchestrator` — per-sensor fan-out, device commands, status snapshots
//! - Provide the **shutdown signal** shared by every background task
//!
//! ## Dependency rule
//! Depends on `domisafe-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod services;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod fakes;
