//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod actuator;
pub mod camera;
pub mod fallback_store;
pub mod record_log;
pub mod sensor;
pub mod transport;

pub use actuator::Actuator;
pub use camera::{Camera, CaptureError};
pub use fallback_store::FallbackStore;
pub use record_log::RecordLog;
pub use sensor::{Sensor, SensorError};
pub use transport::{Transport, TransportError};
