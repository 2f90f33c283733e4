//! Sensor port — one physical or logical sensor.

use std::future::Future;

use domisafe_domain::id::SensorId;
use domisafe_domain::reading::{Measurement, SensorKind};

/// Failure reported by a sensor collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    /// The sensor answered but had no data yet (e.g. DHT checksum miss).
    #[error("sensor not ready: {0}")]
    NotReady(String),

    /// The bus or device failed.
    #[error("hardware failure: {0}")]
    Hardware(String),
}

/// A pollable sensor.
///
/// Implementations only read the hardware; timeouts, validation and
/// timestamps are applied by [`SensorReader`](crate::services::sensor_reader::SensorReader).
pub trait Sensor: Send + Sync {
    /// Configured identifier of this sensor.
    fn id(&self) -> &SensorId;

    /// What the sensor measures.
    fn kind(&self) -> SensorKind;

    /// Take one sample.
    fn poll(&self) -> impl Future<Output = Result<Vec<Measurement>, SensorError>> + Send;
}
