//! # domisafe-adapter-mqtt
//!
//! MQTT adapter — connects the publisher to a broker through
//! [rumqttc](https://docs.rs/rumqttc).
//!
//! ## Responsibilities
//! - Implement the `Transport` port defined in `domisafe-app::ports`
//! - Publish telemetry lines on `<base>/<category>` with QoS 1 and resolve
//!   each publish on the broker's `PUBACK`
//! - Subscribe to `<base>/devices/+/set` and forward parsed
//!   [`DeviceCommand`](domisafe_domain::device::DeviceCommand)s on an mpsc channel
//! - Report a dropped session so the publisher can reconnect
//!
//! ## Dependency rule
//! Same as other adapters: depends on `domisafe-app` and `domisafe-domain`.

pub mod config;
pub mod error;
pub mod topics;
pub mod transport;

pub use config::MqttConfig;
pub use error::MqttError;
pub use transport::MqttTransport;
