//! Event — an immutable record of something that happened.
//!
//! Events are produced by the event classifier (motion) and by the
//! orchestrator when it actuates a device (`device_state_change`).

use serde::{Deserialize, Serialize};

use crate::device::DeviceState;
use crate::id::{DeviceId, SensorId};
use crate::time::Timestamp;

/// Discriminator for the kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Motion,
    /// Reserved: no smoke sensor exists yet, nothing emits this today.
    Smoke,
    DeviceStateChange,
}

impl EventType {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Motion => "motion",
            Self::Smoke => "smoke",
            Self::DeviceStateChange => "device_state_change",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete, timestamped occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    #[serde(with = "crate::time::iso_seconds")]
    pub timestamp: Timestamp,
    /// Path of a captured image, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<SensorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// New state, for `device_state_change`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
    /// Record-level note, e.g. that attachment capture failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Event {
    /// A motion event raised by `sensor_id`.
    #[must_use]
    pub fn motion(sensor_id: SensorId, timestamp: Timestamp) -> Self {
        Self {
            event_type: EventType::Motion,
            timestamp,
            attachment: None,
            sensor_id: Some(sensor_id),
            device_id: None,
            state: None,
            note: None,
        }
    }

    /// A device switched to `state`.
    #[must_use]
    pub fn device_state_change(device_id: DeviceId, state: DeviceState, timestamp: Timestamp) -> Self {
        Self {
            event_type: EventType::DeviceStateChange,
            timestamp,
            attachment: None,
            sensor_id: None,
            device_id: Some(device_id),
            state: Some(state),
            note: None,
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, path: impl Into<String>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Whether this is a security event (motion / smoke).
    #[must_use]
    pub fn is_security(&self) -> bool {
        matches!(self.event_type, EventType::Motion | EventType::Smoke)
    }
}
