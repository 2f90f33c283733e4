//! MQTT broker configuration.

use std::fmt;
use std::time::Duration;

use rumqttc::MqttOptions;
use serde::Deserialize;

/// Configuration for the MQTT transport.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Base topic prefix for all domisafe MQTT communication.
    pub base_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// How long to wait for the broker's `CONNACK`, in seconds.
    pub connect_timeout_secs: u16,
    /// How long to wait for the broker's `PUBACK`, in seconds.
    pub ack_timeout_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "domisafe".to_string(),
            base_topic: "domisafe".to_string(),
            keep_alive_secs: 30,
            username: None,
            password: None,
            connect_timeout_secs: 10,
            ack_timeout_secs: 10,
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.into())
    }

    #[must_use]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs.into())
    }

    /// rumqttc options for a fresh session.
    #[must_use]
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs.into()));
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }
        options
    }
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("broker_host", &self.broker_host)
            .field("broker_port", &self.broker_port)
            .field("client_id", &self.client_id)
            .field("base_topic", &self.base_topic)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("ack_timeout_secs", &self.ack_timeout_secs)
            .finish()
    }
}
