//! Virtual temperature/humidity sensor.

use std::sync::atomic::{AtomicU64, Ordering};

use domisafe_app::ports::{Sensor, SensorError};
use domisafe_domain::id::SensorId;
use domisafe_domain::reading::{Measurement, SensorKind};

const DEFAULT_TEMPERATURE: f64 = 21.5;
const DEFAULT_HUMIDITY: f64 = 45.0;

/// A simulated DHT-style sensor.
///
/// Values follow a saw-tooth around the baseline, rounded to one decimal like
/// the real hardware reports them.
pub struct VirtualEnvironmentalSensor {
    id: SensorId,
    temperature: f64,
    humidity: f64,
    fail_every: Option<u64>,
    polls: AtomicU64,
}

impl VirtualEnvironmentalSensor {
    #[must_use]
    pub fn new(id: SensorId) -> Self {
        Self {
            id,
            temperature: DEFAULT_TEMPERATURE,
            humidity: DEFAULT_HUMIDITY,
            fail_every: None,
            polls: AtomicU64::new(0),
        }
    }

    /// Override the baseline values.
    #[must_use]
    pub fn with_baseline(mut self, temperature: f64, humidity: f64) -> Self {
        self.temperature = temperature;
        self.humidity = humidity;
        self
    }

    /// Report a checksum error on every `n`th poll.
    #[must_use]
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n);
        self
    }

    #[must_use]
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }
}

fn drift(count: u64, period: u64, step: f64) -> f64 {
    let phase = u32::try_from(count % period).unwrap_or_default();
    let half = u32::try_from(period / 2).unwrap_or_default();
    (f64::from(phase) - f64::from(half)) * step
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl Sensor for VirtualEnvironmentalSensor {
    fn id(&self) -> &SensorId {
        &self.id
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Environmental
    }

    async fn poll(&self) -> Result<Vec<Measurement>, SensorError> {
        let count = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
        if super::nth(count, self.fail_every) {
            return Err(SensorError::NotReady("checksum mismatch".to_string()));
        }

        let temperature = round_tenth(self.temperature + drift(count, 20, 0.1));
        let humidity = round_tenth(self.humidity + drift(count, 30, 0.2));
        tracing::trace!(sensor = %self.id, temperature, humidity, "virtual reading");
        Ok(vec![
            Measurement::temperature_c(temperature),
            Measurement::humidity_pct(humidity),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domisafe_domain::reading::{HUMIDITY, MeasurementValue, TEMPERATURE};

    fn sensor() -> VirtualEnvironmentalSensor {
        VirtualEnvironmentalSensor::new(SensorId::new("dht22").unwrap())
    }

    fn value(measurements: &[Measurement], name: &str) -> f64 {
        match measurements.iter().find(|m| m.name == name).unwrap().value {
            MeasurementValue::Float(value) => value,
            MeasurementValue::Bool(_) => panic!("{name} is not numeric"),
        }
    }

    #[tokio::test]
    async fn should_report_temperature_and_humidity() {
        let sensor = sensor();

        let measurements = sensor.poll().await.unwrap();

        assert_eq!(measurements.len(), 2);
        // first poll: 21.5 + (1 - 10) * 0.1 and 45.0 + (1 - 15) * 0.2
        assert!((value(&measurements, TEMPERATURE) - 20.6).abs() < 1e-9);
        assert!((value(&measurements, HUMIDITY) - 42.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn should_be_deterministic_across_instances() {
        let a = sensor();
        let b = sensor();

        for _ in 0..5 {
            assert_eq!(a.poll().await.unwrap(), b.poll().await.unwrap());
        }
    }

    #[tokio::test]
    async fn should_stay_near_baseline() {
        let sensor = sensor().with_baseline(18.0, 60.0);

        for _ in 0..40 {
            let measurements = sensor.poll().await.unwrap();
            assert!((value(&measurements, TEMPERATURE) - 18.0).abs() <= 1.0);
            assert!((value(&measurements, HUMIDITY) - 60.0).abs() <= 3.0);
        }
    }

    #[tokio::test]
    async fn should_fail_every_nth_poll() {
        let sensor = sensor().failing_every(3);

        assert!(sensor.poll().await.is_ok());
        assert!(sensor.poll().await.is_ok());
        assert!(matches!(sensor.poll().await, Err(SensorError::NotReady(_))));
        assert!(sensor.poll().await.is_ok());
        assert_eq!(sensor.polls(), 4);
    }

    #[test]
    fn should_report_environmental_kind() {
        assert_eq!(sensor().kind(), SensorKind::Environmental);
        assert_eq!(sensor().id().as_str(), "dht22");
    }
}
