//! Sensor reader — one poll with a hard deadline.

use std::time::Duration;

use domisafe_domain::error::{DomiSafeError, ReadFailure, ReadFailureReason};
use domisafe_domain::id::SensorId;
use domisafe_domain::reading::{Reading, SensorKind};
use domisafe_domain::time;

use crate::ports::Sensor;

/// Default per-poll deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Wraps a [`Sensor`] so that a poll never blocks past its timeout and
/// never raises: every problem comes back as a [`ReadFailure`].
///
/// There is no internal retry, the orchestrator's polling interval is the
/// retry cadence.
pub struct SensorReader<S> {
    sensor: S,
    timeout: Duration,
}

impl<S: Sensor> SensorReader<S> {
    /// Create a reader with the given per-poll deadline.
    pub fn new(sensor: S, timeout: Duration) -> Self {
        Self { sensor, timeout }
    }

    #[must_use]
    pub fn sensor_id(&self) -> &SensorId {
        self.sensor.id()
    }

    #[must_use]
    pub fn kind(&self) -> SensorKind {
        self.sensor.kind()
    }

    /// Poll the sensor once.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadFailure`] when the sensor times out, reports a
    /// hardware error, or answers with measurements that do not form a
    /// valid [`Reading`].
    pub async fn poll(&self) -> Result<Reading, ReadFailure> {
        let measurements = match tokio::time::timeout(self.timeout, self.sensor.poll()).await {
            Ok(Ok(measurements)) => measurements,
            Ok(Err(err)) => return Err(self.failure(ReadFailureReason::Hardware(err.to_string()))),
            Err(_elapsed) => {
                let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(self.failure(ReadFailureReason::Timeout(millis)));
            }
        };

        Reading::builder()
            .sensor_id(self.sensor.id().clone())
            .timestamp(time::now())
            .measurements(measurements)
            .build()
            .map_err(|err| {
                let reason = match err {
                    DomiSafeError::Validation(inner) => ReadFailureReason::Invalid(inner),
                    other => ReadFailureReason::Hardware(other.to_string()),
                };
                self.failure(reason)
            })
    }

    fn failure(&self, reason: ReadFailureReason) -> ReadFailure {
        ReadFailure {
            sensor_id: self.sensor.id().clone(),
            reason,
        }
    }
}
