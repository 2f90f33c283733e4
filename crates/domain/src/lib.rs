//! # domisafe-domain
//!
//! Pure domain model for the domisafe sensor-to-cloud orchestrator.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Readings** (immutable samples from one sensor poll)
//! - Define **Events** (motion, smoke, device state changes)
//! - Define **Device commands** and device-status snapshots
//! - Define **Publish records**, their delivery state and the shared
//!   log / wire line encoding
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod event;
pub mod reading;
pub mod record;
