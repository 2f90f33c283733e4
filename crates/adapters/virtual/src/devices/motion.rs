//! Virtual PIR motion sensor.

use std::sync::atomic::{AtomicU64, Ordering};

use domisafe_app::ports::{Sensor, SensorError};
use domisafe_domain::id::SensorId;
use domisafe_domain::reading::{Measurement, SensorKind};

/// A simulated motion detector that trips on every `every`th poll.
pub struct VirtualMotionSensor {
    id: SensorId,
    every: Option<u64>,
    polls: AtomicU64,
}

impl VirtualMotionSensor {
    /// `every = 0` never reports motion.
    #[must_use]
    pub fn new(id: SensorId, every: u64) -> Self {
        Self {
            id,
            every: Some(every),
            polls: AtomicU64::new(0),
        }
    }
}

impl Sensor for VirtualMotionSensor {
    fn id(&self) -> &SensorId {
        &self.id
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Motion
    }

    async fn poll(&self) -> Result<Vec<Measurement>, SensorError> {
        let count = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
        let detected = super::nth(count, self.every);
        if detected {
            tracing::debug!(sensor = %self.id, "virtual motion");
        }
        Ok(vec![Measurement::motion(detected)])
    }
}
