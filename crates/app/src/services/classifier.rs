//! Event classifier — turns motion readings into debounced security events.

use chrono::TimeDelta;

use domisafe_domain::event::Event;
use domisafe_domain::reading::{self, Reading};
use domisafe_domain::time::Timestamp;

use crate::ports::Camera;

/// Default debounce window between two motion events.
pub const DEFAULT_DEBOUNCE_SECS: i64 = 30;

/// Emits at most one motion event per debounce window, with an attachment
/// captured by the optional camera.
pub struct EventClassifier<C> {
    camera: Option<C>,
    debounce: TimeDelta,
    last_motion: Option<Timestamp>,
}

impl<C: Camera> EventClassifier<C> {
    /// Create a classifier with the default debounce window.
    pub fn new(camera: Option<C>) -> Self {
        Self {
            camera,
            debounce: TimeDelta::seconds(DEFAULT_DEBOUNCE_SECS),
            last_motion: None,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, window: TimeDelta) -> Self {
        self.debounce = window;
        self
    }

    /// Classify one reading.
    ///
    /// Returns `None` for readings without `motion_detected = true` and for
    /// signals within the debounce window of the last emitted event. A
    /// failed capture still yields the event, with no attachment and a note.
    pub async fn classify(&mut self, reading: &Reading) -> Option<Event> {
        if reading.flag(reading::MOTION) != Some(true) {
            return None;
        }

        if let Some(last) = self.last_motion {
            let elapsed = reading.timestamp - last;
            if elapsed >= TimeDelta::zero() && elapsed < self.debounce {
                tracing::debug!(
                    sensor = %reading.sensor_id,
                    elapsed_secs = elapsed.num_seconds(),
                    "motion signal suppressed by debounce"
                );
                return None;
            }
        }
        self.last_motion = Some(reading.timestamp);

        let event = Event::motion(reading.sensor_id.clone(), reading.timestamp);
        let Some(camera) = &self.camera else {
            return Some(event);
        };
        match camera.capture(reading.timestamp).await {
            Ok(path) => Some(event.with_attachment(path)),
            Err(err) => {
                tracing::warn!(error = %err, sensor = %reading.sensor_id, "attachment capture failed");
                Some(event.with_note(format!("capture failed: {err}")))
            }
        }
    }
}
