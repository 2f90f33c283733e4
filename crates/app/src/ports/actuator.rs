//! Actuator port — local feedback devices and controlled appliances alike.

use std::future::Future;

use domisafe_domain::device::DeviceState;
use domisafe_domain::error::DomiSafeError;
use domisafe_domain::id::DeviceId;

/// Switches devices on and off.
pub trait Actuator: Send + Sync {
    /// Drive `device_id` to `state`.
    fn set_state(
        &self,
        device_id: &DeviceId,
        state: DeviceState,
    ) -> impl Future<Output = Result<(), DomiSafeError>> + Send;
}

impl<T: Actuator> Actuator for std::sync::Arc<T> {
    fn set_state(
        &self,
        device_id: &DeviceId,
        state: DeviceState,
    ) -> impl Future<Output = Result<(), DomiSafeError>> + Send {
        (**self).set_state(device_id, state)
    }
}
