//! Devices — local actuators (LEDs, buzzer) and controlled appliances.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Binary state of an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    On,
    #[default]
    Off,
}

impl DeviceState {
    /// Parse a remote control payload (`on`, `1`, `true`, `high`, …).
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownState`] for anything else.
    pub fn parse_payload(payload: &str) -> Result<Self, ValidationError> {
        match payload.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" | "high" => Ok(Self::On),
            "off" | "0" | "false" | "low" => Ok(Self::Off),
            other => Err(ValidationError::UnknownState(other.to_string())),
        }
    }

    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// A request, issued outside the core, to switch a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub device_id: DeviceId,
    pub requested_state: DeviceState,
    #[serde(with = "crate::time::iso_seconds")]
    pub issued_at: Timestamp,
}

/// Periodic snapshot of a device's last known state (local log only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device_id: DeviceId,
    pub state: DeviceState,
    #[serde(with = "crate::time::iso_seconds")]
    pub timestamp: Timestamp,
}
