//! Virtual devices — environmental sensor, motion sensor, camera, actuators.
//!
//! Sensor output depends only on the poll count, so a given sequence of polls
//! always produces the same readings.

mod actuator;
mod camera;
mod environmental;
mod motion;

pub use actuator::VirtualActuatorBank;
pub use camera::VirtualCamera;
pub use environmental::VirtualEnvironmentalSensor;
pub use motion::VirtualMotionSensor;

/// Whether poll number `count` (1-based) is a multiple of `every`.
fn nth(count: u64, every: Option<u64>) -> bool {
    every.is_some_and(|every| every > 0 && count % every == 0)
}
