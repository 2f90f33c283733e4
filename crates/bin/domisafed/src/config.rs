//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `domisafe.toml` in the working directory (or the path in
//! `DOMISAFE_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use domisafe_adapter_mqtt::MqttConfig;
use domisafe_app::services::publisher::PublisherConfig;
use domisafe_domain::id::{DeviceId, SensorId};
use domisafe_domain::reading::SensorKind;

const DEFAULT_PATH: &str = "domisafe.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    /// Local log directory and fallback database.
    pub storage: StorageConfig,
    pub mqtt: MqttConfig,
    /// Reconnect backoff bounds.
    pub publisher: BackoffConfig,
    /// One entry per `[[sensors]]` table.
    pub sensors: Vec<SensorConfig>,
    /// Local outputs that accept remote commands.
    pub devices: DevicesConfig,
    pub indicator: IndicatorConfig,
    pub camera: CameraConfig,
    pub shutdown: ShutdownConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the daily `YYYYMMDD_<category>.txt` files.
    pub log_dir: PathBuf,
    pub flush_interval_secs: u64,
    /// `SQLite` connection URL of the fallback store.
    pub database_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

/// A polled sensor. Only the simulated drivers exist for now.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub id: SensorId,
    pub kind: SensorKind,
    #[serde(default = "default_sensor_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_sensor_timeout")]
    pub timeout_ms: u64,
    /// Motion debounce window.
    #[serde(default = "default_debounce")]
    pub debounce_secs: i64,
    /// Simulated environmental sensor: fail every Nth poll.
    #[serde(default)]
    pub fail_every: Option<u64>,
    /// Simulated motion sensor: report motion every Nth poll (0 = never).
    #[serde(default = "default_motion_every")]
    pub motion_every: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub names: Vec<DeviceId>,
    /// Period of the `device-status` snapshot lines.
    pub status_interval_secs: u64,
    /// Devices that switch themselves back off this many seconds after an
    /// `on` command.
    pub momentary_secs: BTreeMap<DeviceId, u64>,
}

/// Optional connectivity indicator outputs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub online_device: Option<DeviceId>,
    pub offline_device: Option<DeviceId>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Attach a capture to motion events.
    pub enabled: bool,
    pub image_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long running tasks get to stop before they are abandoned.
    pub grace_secs: u64,
}

fn default_sensor_interval() -> u64 {
    5
}

fn default_sensor_timeout() -> u64 {
    2_000
}

fn default_debounce() -> i64 {
    30
}

fn default_motion_every() -> u64 {
    10
}

impl Config {
    /// Load configuration from `domisafe.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DOMISAFE_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("DOMISAFE_LOG_DIR") {
            self.storage.log_dir = val.into();
        }
        if let Some(val) = var("DOMISAFE_DATABASE_URL") {
            self.storage.database_url = val;
        }
        if let Some(val) = var("DOMISAFE_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("DOMISAFE_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("DOMISAFE_MQTT_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Some(val) = var("DOMISAFE_MQTT_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Some(val) = var("DOMISAFE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation("mqtt port must be non-zero".to_string()));
        }
        if self.publisher.backoff_min_secs == 0 {
            return Err(ConfigError::Validation("backoff_min_secs must be non-zero".to_string()));
        }
        if self.publisher.backoff_max_secs < self.publisher.backoff_min_secs {
            return Err(ConfigError::Validation(
                "backoff_max_secs must not be below backoff_min_secs".to_string(),
            ));
        }
        if self.storage.flush_interval_secs == 0 || self.devices.status_interval_secs == 0 {
            return Err(ConfigError::Validation("intervals must be non-zero".to_string()));
        }

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(sensor.id.as_str()) {
                return Err(ConfigError::Validation(format!("duplicate sensor {}", sensor.id)));
            }
            if sensor.interval_secs == 0 || sensor.timeout_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "sensor {}: interval and timeout must be non-zero",
                    sensor.id
                )));
            }
            if sensor.debounce_secs < 0 {
                return Err(ConfigError::Validation(format!(
                    "sensor {}: debounce must not be negative",
                    sensor.id
                )));
            }
        }

        for (device, secs) in &self.devices.momentary_secs {
            if !self.devices.names.contains(device) {
                return Err(ConfigError::Validation(format!(
                    "momentary device {device} is not a configured device"
                )));
            }
            if *secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "momentary device {device}: hold must be non-zero"
                )));
            }
        }

        for device in [&self.indicator.online_device, &self.indicator.offline_device]
            .into_iter()
            .flatten()
        {
            if !self.devices.names.contains(device) {
                return Err(ConfigError::Validation(format!(
                    "indicator device {device} is not a configured device"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn publisher(&self) -> PublisherConfig {
        PublisherConfig {
            base_topic: self.mqtt.base_topic.clone(),
            backoff_min: Duration::from_secs(self.publisher.backoff_min_secs),
            backoff_max: Duration::from_secs(self.publisher.backoff_max_secs),
        }
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.storage.flush_interval_secs)
    }

    #[must_use]
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.devices.status_interval_secs)
    }

    /// Hold time of every momentary device.
    pub fn momentary(&self) -> impl Iterator<Item = (DeviceId, Duration)> + '_ {
        self.devices
            .momentary_secs
            .iter()
            .map(|(device, secs)| (device.clone(), Duration::from_secs(*secs)))
    }

    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown.grace_secs)
    }
}

impl SensorConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn debounce(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(self.debounce_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "domisafed=info,domisafe=info,sqlx=warn,rumqttc=warn".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            flush_interval_secs: 10,
            database_url: "sqlite:domisafe.db?mode=rwc".to_string(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_min_secs: 1,
            backoff_max_secs: 60,
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            status_interval_secs: 10,
            momentary_secs: BTreeMap::new(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image_dir: PathBuf::from("captured_images"),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.log_dir, PathBuf::from("logs"));
        assert_eq!(config.storage.database_url, "sqlite:domisafe.db?mode=rwc");
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert_eq!(config.status_interval(), Duration::from_secs(10));
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.mqtt.broker_port, 1883);
        assert!(config.sensors.is_empty());
        assert!(config.camera.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.publisher.backoff_max_secs, 60);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [logging]
            filter = 'debug'

            [storage]
            log_dir = '/var/lib/domisafe/logs'
            flush_interval_secs = 3
            database_url = 'sqlite:test.db'

            [mqtt]
            broker_host = 'broker.local'
            base_topic = 'home'

            [publisher]
            backoff_min_secs = 2
            backoff_max_secs = 30

            [[sensors]]
            id = 'dht22'
            kind = 'environmental'
            interval_secs = 5
            fail_every = 7

            [[sensors]]
            id = 'pir'
            kind = 'motion'
            interval_secs = 1
            debounce_secs = 10
            motion_every = 4

            [devices]
            names = ['led_green', 'led_red', 'buzzer']
            status_interval_secs = 15

            [devices.momentary_secs]
            buzzer = 15

            [indicator]
            online_device = 'led_green'
            offline_device = 'led_red'

            [camera]
            enabled = false
            image_dir = 'images'

            [shutdown]
            grace_secs = 2
        ";
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.storage.log_dir, PathBuf::from("/var/lib/domisafe/logs"));
        assert_eq!(config.mqtt.broker_host, "broker.local");
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.sensors[0].kind, SensorKind::Environmental);
        assert_eq!(config.sensors[0].fail_every, Some(7));
        assert_eq!(config.sensors[0].timeout(), Duration::from_secs(2));
        assert_eq!(config.sensors[1].kind, SensorKind::Motion);
        assert_eq!(config.sensors[1].debounce(), chrono::TimeDelta::seconds(10));
        assert_eq!(config.sensors[1].motion_every, 4);
        assert_eq!(config.devices.names.len(), 3);
        assert_eq!(
            config.momentary().collect::<Vec<_>>(),
            vec![(DeviceId::new("buzzer").unwrap(), Duration::from_secs(15))]
        );
        assert_eq!(config.indicator.online_device.as_ref().unwrap().as_str(), "led_green");
        assert!(!config.camera.enabled);
        assert_eq!(config.grace_period(), Duration::from_secs(2));
        assert!(config.validate().is_ok());

        let publisher = config.publisher();
        assert_eq!(publisher.base_topic, "home");
        assert_eq!(publisher.backoff_min, Duration::from_secs(2));
        assert_eq!(publisher.backoff_max, Duration::from_secs(30));
    }

    #[test]
    fn should_reject_blank_sensor_id() {
        let toml = "
            [[sensors]]
            id = '  '
            kind = 'motion'
        ";
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_apply_environment_overrides() {
        let mut config = Config::default();

        config.apply_overrides(env(&[
            ("DOMISAFE_LOG_DIR", "/tmp/logs"),
            ("DOMISAFE_DATABASE_URL", "sqlite::memory:"),
            ("DOMISAFE_MQTT_HOST", "10.0.0.5"),
            ("DOMISAFE_MQTT_PORT", "8883"),
            ("DOMISAFE_MQTT_USERNAME", "pi"),
            ("DOMISAFE_MQTT_PASSWORD", "hunter2"),
            ("DOMISAFE_LOG", "trace"),
        ]));

        assert_eq!(config.storage.log_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.storage.database_url, "sqlite::memory:");
        assert_eq!(config.mqtt.broker_host, "10.0.0.5");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.mqtt.username.as_deref(), Some("pi"));
        assert_eq!(config.mqtt.password.as_deref(), Some("hunter2"));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_rust_log_over_domisafe_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("DOMISAFE_LOG", "debug"), ("RUST_LOG", "warn")]));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("DOMISAFE_MQTT_PORT", "not-a-port")]));
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_reject_inverted_backoff_bounds() {
        let mut config = Config::default();
        config.publisher.backoff_min_secs = 10;
        config.publisher.backoff_max_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_backoff() {
        let mut config = Config::default();
        config.publisher.backoff_min_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_duplicate_sensor_ids() {
        let toml = "
            [[sensors]]
            id = 'pir'
            kind = 'motion'

            [[sensors]]
            id = 'pir'
            kind = 'environmental'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_sensor_interval() {
        let toml = "
            [[sensors]]
            id = 'dht22'
            kind = 'environmental'
            interval_secs = 0
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_indicator_for_unknown_device() {
        let toml = "
            [devices]
            names = ['led_green']

            [indicator]
            offline_device = 'led_red'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_momentary_hold_for_unknown_device() {
        let toml = "
            [devices]
            names = ['led_green']

            [devices.momentary_secs]
            buzzer = 15
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_momentary_hold() {
        let toml = "
            [devices]
            names = ['buzzer']

            [devices.momentary_secs]
            buzzer = 0
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
