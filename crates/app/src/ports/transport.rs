//! Transport port — the remote message-broker endpoint.
//!
//! Credentials and TLS are the adapter's business; the core only sees
//! connect / publish / disconnect and a signal for a dropped link.

use std::future::Future;

/// Failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The endpoint refused or could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// No answer within the adapter's deadline.
    #[error("timed out waiting for the endpoint")]
    Timeout,

    /// The link dropped while a request was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// The client library rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// A connection to the remote telemetry / control service.
pub trait Transport: Send + Sync {
    /// Establish a session. Resolves once the endpoint accepted it.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish `payload` on `topic`. Resolves once the endpoint confirmed
    /// delivery.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Resolves when an established session drops.
    fn closed(&self) -> impl Future<Output = ()> + Send;

    /// Close the session.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).connect()
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(topic, payload)
    }

    fn closed(&self) -> impl Future<Output = ()> + Send {
        (**self).closed()
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send {
        (**self).disconnect()
    }
}
