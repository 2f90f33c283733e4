//! Virtual actuator bank — LEDs, relays and similar on/off outputs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use domisafe_app::ports::Actuator;
use domisafe_domain::device::DeviceState;
use domisafe_domain::error::{DomiSafeError, NotFoundError};
use domisafe_domain::id::DeviceId;

/// A fixed set of simulated outputs, all starting `Off`.
pub struct VirtualActuatorBank {
    states: Mutex<BTreeMap<DeviceId, DeviceState>>,
}

impl VirtualActuatorBank {
    #[must_use]
    pub fn new(devices: impl IntoIterator<Item = DeviceId>) -> Self {
        let states = devices
            .into_iter()
            .map(|device| (device, DeviceState::Off))
            .collect();
        Self {
            states: Mutex::new(states),
        }
    }

    fn states(&self) -> MutexGuard<'_, BTreeMap<DeviceId, DeviceState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last state written to `device`, if it belongs to the bank.
    #[must_use]
    pub fn state(&self, device: &DeviceId) -> Option<DeviceState> {
        self.states().get(device).copied()
    }
}

impl Actuator for VirtualActuatorBank {
    async fn set_state(&self, device: &DeviceId, state: DeviceState) -> Result<(), DomiSafeError> {
        let mut states = self.states();
        let slot = states
            .get_mut(device)
            .ok_or_else(|| NotFoundError::device(device))?;
        *slot = state;
        tracing::info!(%device, %state, "virtual output switched");
        Ok(())
    }
}
