//! Publish records and their log / wire encoding.
//!
//! A [`PublishRecord`] wraps whatever the orchestrator fans out (a reading,
//! an event or a device-status snapshot) with a monotonic id and a delivery
//! state. The same JSON line is written to the local log and sent to the
//! broker, so the wire and log formats never drift apart.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceState, DeviceStatus};
use crate::event::{Event, EventType};
use crate::id::RecordId;
use crate::reading::{self, Reading};
use crate::time::{self, Timestamp};

/// Log / topic category. Exactly one log partition is open per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Environmental,
    Security,
    DeviceStatus,
}

impl Category {
    /// Stable string form used in file names and topics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environmental => "environmental",
            Self::Security => "security",
            Self::DeviceStatus => "device-status",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a record carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Reading(Reading),
    Event(Event),
    Status(DeviceStatus),
}

#[derive(Serialize)]
struct EnvironmentalLine<'a> {
    timestamp: String,
    temperature: Option<f64>,
    humidity: Option<f64>,
    sensor_id: &'a str,
}

#[derive(Serialize)]
struct SecurityLine<'a> {
    timestamp: String,
    motion_detected: bool,
    smoke_detected: bool,
    image_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

#[derive(Serialize)]
struct DeviceStatusLine<'a> {
    timestamp: String,
    device_name: &'a str,
    status: DeviceState,
}

impl Payload {
    /// The category this payload is logged and published under.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Reading(_) => Category::Environmental,
            Self::Event(event) if event.is_security() => Category::Security,
            Self::Event(_) | Self::Status(_) => Category::DeviceStatus,
        }
    }

    /// When the underlying reading / event / snapshot happened.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Reading(reading) => reading.timestamp,
            Self::Event(event) => event.timestamp,
            Self::Status(status) => status.timestamp,
        }
    }

    /// Encode as a single JSON line (no trailing newline), fields in the
    /// documented order of the category's schema.
    ///
    /// # Errors
    ///
    /// Fails only if `serde_json` cannot encode a value.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let timestamp = time::format_iso(&self.timestamp());
        match self {
            Self::Reading(reading) => serde_json::to_string(&EnvironmentalLine {
                timestamp,
                temperature: reading.float(reading::TEMPERATURE),
                humidity: reading.float(reading::HUMIDITY),
                sensor_id: reading.sensor_id.as_str(),
            }),
            Self::Event(event) if event.is_security() => serde_json::to_string(&SecurityLine {
                timestamp,
                motion_detected: event.event_type == EventType::Motion,
                smoke_detected: event.event_type == EventType::Smoke,
                image_path: event.attachment.as_deref().unwrap_or_default(),
                note: event.note.as_deref(),
            }),
            Self::Event(event) => serde_json::to_string(&DeviceStatusLine {
                timestamp,
                device_name: event.device_id.as_ref().map_or("", |id| id.as_str()),
                status: event.state.unwrap_or_default(),
            }),
            Self::Status(status) => serde_json::to_string(&DeviceStatusLine {
                timestamp,
                device_name: status.device_id.as_str(),
                status: status.state,
            }),
        }
    }
}

/// Delivery lifecycle of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

impl DeliveryState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DeliveryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown delivery state {other:?}")),
        }
    }
}

/// A payload on its way to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub id: RecordId,
    pub payload: Payload,
    pub delivery_state: DeliveryState,
    #[serde(with = "crate::time::iso_seconds")]
    pub created_at: Timestamp,
}

impl PublishRecord {
    /// A fresh record in the `pending` state.
    #[must_use]
    pub fn new(id: RecordId, payload: Payload) -> Self {
        Self {
            id,
            payload,
            delivery_state: DeliveryState::Pending,
            created_at: time::now(),
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.payload.category()
    }

    pub fn confirm(&mut self) {
        self.delivery_state = DeliveryState::Confirmed;
    }

    pub fn fail(&mut self) {
        self.delivery_state = DeliveryState::Failed;
    }
}

/// Hands out strictly increasing [`RecordId`]s.
///
/// Seed it with the highest id already persisted so a restarted process
/// never reuses an id still waiting in the fallback store.
#[derive(Debug)]
pub struct RecordIdGenerator {
    next: AtomicU64,
}

impl RecordIdGenerator {
    /// Start right after `last` (or at 1 when nothing was persisted).
    #[must_use]
    pub fn starting_after(last: Option<RecordId>) -> Self {
        Self {
            next: AtomicU64::new(last.map_or(1, |id| id.as_u64() + 1)),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> RecordId {
        RecordId::from_raw(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self::starting_after(None)
    }
}
