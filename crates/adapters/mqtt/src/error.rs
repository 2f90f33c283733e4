//! MQTT adapter error types.

use domisafe_app::ports::TransportError;
use domisafe_domain::error::DomiSafeError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// No session is established.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// A message arrived on a topic that is not a command topic.
    #[error("not a command topic: {0}")]
    UnknownTopic(String),

    /// A command payload was not UTF-8.
    #[error("command payload is not UTF-8")]
    PayloadEncoding(#[source] std::str::Utf8Error),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] DomiSafeError),
}

impl MqttError {
    /// Convert into a [`DomiSafeError::Transport`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> DomiSafeError {
        match self {
            Self::Domain(err) => err,
            other => DomiSafeError::Transport(Box::new(other)),
        }
    }
}

impl From<MqttError> for DomiSafeError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<MqttError> for TransportError {
    fn from(err: MqttError) -> Self {
        match err {
            MqttError::NotConnected => Self::ConnectionLost,
            MqttError::Client(inner) => Self::Rejected(inner.to_string()),
            other => Self::Rejected(other.to_string()),
        }
    }
}
