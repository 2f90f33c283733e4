//! Reading — an immutable sample produced by one successful sensor poll.

use chrono::SubsecRound;
use serde::{Deserialize, Serialize};

use crate::error::{DomiSafeError, ValidationError};
use crate::id::SensorId;
use crate::time::{self, Timestamp};

/// Well-known measurement name for air temperature (°C).
pub const TEMPERATURE: &str = "temperature";
/// Well-known measurement name for relative humidity (%).
pub const HUMIDITY: &str = "humidity";
/// Well-known measurement name for a PIR motion input.
pub const MOTION: &str = "motion_detected";

/// What a sensor measures, which decides how its readings are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Temperature / humidity; readings are fanned out as-is.
    Environmental,
    /// Edge-triggered motion input; readings go through the event classifier.
    Motion,
}

/// A single typed measurement value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Bool(bool),
    Float(f64),
}

/// One named value inside a [`Reading`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: MeasurementValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Measurement {
    /// A numeric measurement with an optional unit.
    #[must_use]
    pub fn float(name: impl Into<String>, value: f64, unit: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: MeasurementValue::Float(value),
            unit: unit.map(str::to_string),
        }
    }

    /// A boolean measurement.
    #[must_use]
    pub fn flag(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value: MeasurementValue::Bool(value),
            unit: None,
        }
    }

    #[must_use]
    pub fn temperature_c(value: f64) -> Self {
        Self::float(TEMPERATURE, value, Some("°C"))
    }

    #[must_use]
    pub fn humidity_pct(value: f64) -> Self {
        Self::float(HUMIDITY, value, Some("%"))
    }

    #[must_use]
    pub fn motion(detected: bool) -> Self {
        Self::flag(MOTION, detected)
    }
}

/// An immutable sample from one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: SensorId,
    #[serde(with = "crate::time::iso_seconds")]
    pub timestamp: Timestamp,
    pub measurements: Vec<Measurement>,
}

impl Reading {
    /// Create a builder for constructing a [`Reading`].
    #[must_use]
    pub fn builder() -> ReadingBuilder {
        ReadingBuilder::default()
    }

    /// Look up a measurement value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MeasurementValue> {
        self.measurements
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
    }

    /// Numeric value of a measurement, if present and numeric.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            MeasurementValue::Float(value) => Some(value),
            MeasurementValue::Bool(_) => None,
        }
    }

    /// Boolean value of a measurement, if present and boolean.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            MeasurementValue::Bool(value) => Some(value),
            MeasurementValue::Float(_) => None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DomiSafeError::Validation`] when there is no measurement or
    /// a numeric measurement is not finite.
    pub fn validate(&self) -> Result<(), DomiSafeError> {
        if self.measurements.is_empty() {
            return Err(ValidationError::NoMeasurement.into());
        }
        for measurement in &self.measurements {
            if let MeasurementValue::Float(value) = measurement.value {
                if !value.is_finite() {
                    return Err(ValidationError::NonFinite(measurement.name.clone()).into());
                }
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Reading`].
#[derive(Debug, Default)]
pub struct ReadingBuilder {
    sensor_id: Option<SensorId>,
    timestamp: Option<Timestamp>,
    measurements: Vec<Measurement>,
}

impl ReadingBuilder {
    #[must_use]
    pub fn sensor_id(mut self, sensor_id: SensorId) -> Self {
        self.sensor_id = Some(sensor_id);
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn measurement(mut self, measurement: Measurement) -> Self {
        self.measurements.push(measurement);
        self
    }

    #[must_use]
    pub fn measurements(mut self, measurements: impl IntoIterator<Item = Measurement>) -> Self {
        self.measurements.extend(measurements);
        self
    }

    /// Consume the builder, validate, and return a [`Reading`].
    ///
    /// The timestamp defaults to now and is truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`DomiSafeError::Validation`] if the sensor id is missing or
    /// the measurements are invalid.
    pub fn build(self) -> Result<Reading, DomiSafeError> {
        let sensor_id = self.sensor_id.ok_or(ValidationError::EmptyId)?;
        let reading = Reading {
            sensor_id,
            timestamp: self.timestamp.map_or_else(time::now, |ts| ts.trunc_subsecs(0)),
            measurements: self.measurements,
        };
        reading.validate()?;
        Ok(reading)
    }
}
