//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod backoff;
pub mod classifier;
pub mod orchestrator;
pub mod publisher;
pub mod sensor_reader;
