//! Topic layout and command parsing.
//!
//! | direction | topic                               | payload                 |
//! |-----------|-------------------------------------|-------------------------|
//! | out       | `<base>/<category>`                 | one JSON log line       |
//! | in        | `<base>/devices/<device_id>/set`    | `on`, `off`, `1`, `0`…  |
//!
//! Outgoing topics are built by the publisher; only the incoming side
//! lives here.

use domisafe_domain::device::{DeviceCommand, DeviceState};
use domisafe_domain::error::DomiSafeError;
use domisafe_domain::id::DeviceId;
use domisafe_domain::time;

use crate::error::MqttError;

fn trimmed(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Subscription filter matching every device command topic.
#[must_use]
pub fn command_filter(base: &str) -> String {
    format!("{}/devices/+/set", trimmed(base))
}

/// Device name embedded in a command topic.
#[must_use]
pub fn command_device<'a>(base: &str, topic: &'a str) -> Option<&'a str> {
    let rest = topic.strip_prefix(trimmed(base))?.strip_prefix("/devices/")?;
    let device = rest.strip_suffix("/set")?;
    (!device.is_empty() && !device.contains('/')).then_some(device)
}

/// Parse an incoming command message.
///
/// # Errors
///
/// - [`MqttError::UnknownTopic`] when `topic` is not a command topic.
/// - [`MqttError::PayloadEncoding`] when the payload is not UTF-8.
/// - [`MqttError::Domain`] when the device name or state is invalid.
pub fn parse_command(base: &str, topic: &str, payload: &[u8]) -> Result<DeviceCommand, MqttError> {
    let device = command_device(base, topic).ok_or_else(|| MqttError::UnknownTopic(topic.to_string()))?;
    let payload = std::str::from_utf8(payload).map_err(MqttError::PayloadEncoding)?;

    let device_id = DeviceId::new(device).map_err(|err| MqttError::Domain(DomiSafeError::from(err)))?;
    let requested_state =
        DeviceState::parse_payload(payload).map_err(|err| MqttError::Domain(DomiSafeError::from(err)))?;

    Ok(DeviceCommand {
        device_id,
        requested_state,
        issued_at: time::now(),
    })
}
