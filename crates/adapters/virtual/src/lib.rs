//! # domisafe-adapter-virtual
//!
//! Simulated collaborators for running the daemon without hardware, and for
//! tests that need deterministic sensor output.
//!
//! ## Provided collaborators
//!
//! | Type | Port | Behaviour |
//! |------|------|-----------|
//! | [`VirtualEnvironmentalSensor`] | `Sensor` | Temperature and humidity drifting around a baseline, optionally failing every Nth poll |
//! | [`VirtualMotionSensor`] | `Sensor` | Reports motion on every Nth poll |
//! | [`VirtualCamera`] | `Camera` | Writes a placeholder capture file and returns its path |
//! | [`VirtualActuatorBank`] | `Actuator` | Remembers the last state of each configured device |
//!
//! ## Dependency rule
//!
//! Depends on `domisafe-app` (port traits) and `domisafe-domain` only.

mod devices;

pub use devices::{
    VirtualActuatorBank, VirtualCamera, VirtualEnvironmentalSensor, VirtualMotionSensor,
};
