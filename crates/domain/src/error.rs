//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`DomiSafeError`] via `From` when crossing a port boundary.

use crate::id::{DeviceId, SensorId};

/// Base error for everything that crosses a port boundary.
#[derive(Debug, thiserror::Error)]
pub enum DomiSafeError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced item does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A durable store (log files, fallback database) failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The remote endpoint or its client library failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A local collaborator (sensor, actuator, camera) failed.
    #[error("device error")]
    Device(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// An identifier was empty.
    #[error("identifier must not be empty")]
    EmptyId,

    /// A reading was built without any measurement.
    #[error("reading must contain at least one measurement")]
    NoMeasurement,

    /// A measurement value was NaN or infinite.
    #[error("measurement {0} is not a finite number")]
    NonFinite(String),

    /// A device state payload could not be understood.
    #[error("unrecognised device state {0:?}")]
    UnknownState(String),
}

/// Lookup failure for a named item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of item (e.g. `"Device"`).
    pub entity: &'static str,
    /// Identifier that was looked up.
    pub id: String,
}

impl NotFoundError {
    /// Shortcut for an unknown device.
    #[must_use]
    pub fn device(id: &DeviceId) -> Self {
        Self {
            entity: "Device",
            id: id.to_string(),
        }
    }
}

/// Why a sensor poll did not produce a reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadFailureReason {
    /// The collaborator did not answer within the per-sensor timeout.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The collaborator reported a hardware error.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// The collaborator answered with data that does not form a valid reading.
    #[error("invalid reading: {0}")]
    Invalid(ValidationError),
}

/// A transient sensor read failure, retried on the next poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sensor {sensor_id} read failed: {reason}")]
pub struct ReadFailure {
    pub sensor_id: SensorId,
    pub reason: ReadFailureReason,
}

/// Why a publish did not get a delivery confirmation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishFailure {
    /// The publisher is not in the connected state.
    #[error("not connected")]
    NotConnected,

    /// The transport accepted the connection but the publish failed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The payload could not be encoded.
    #[error("payload encoding failed: {0}")]
    Encoding(String),
}
