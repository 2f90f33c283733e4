//! Remote publisher — connection state machine, reconnect backoff and
//! fallback replay.
//!
//! ```text
//! DISCONNECTED ──connect──▶ CONNECTING ──replay drained──▶ CONNECTED
//!      ▲                        │                              │
//!      └──── refused / replay failed ◀─── link lost / publish failed
//! ```
//!
//! Only [`RemotePublisher::run`] moves the state forward. A publish failure
//! observed by [`RemotePublisher::publish`] drops it back to `Disconnected`,
//! which wakes the connection manager.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{RwLock, RwLockReadGuard, watch};

use domisafe_domain::error::{DomiSafeError, PublishFailure};
use domisafe_domain::id::RecordId;
use domisafe_domain::record::{Category, PublishRecord};

use crate::ports::{FallbackStore, Transport};
use crate::services::backoff::Backoff;
use crate::shutdown::Shutdown;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Delivery confirmation for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    pub record_id: RecordId,
}

/// Publisher settings.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Prefix of every telemetry topic (`<base>/<category>`).
    pub base_topic: String,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_topic: "domisafe".to_string(),
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("fallback store unavailable")]
    Store(#[source] DomiSafeError),

    #[error("replay publish failed")]
    Publish(#[source] PublishFailure),

    #[error("shutdown requested during replay")]
    Interrupted,
}

/// Publishes records to the remote endpoint and replays the fallback store
/// on every (re)connect.
pub struct RemotePublisher<T, F> {
    transport: T,
    fallback: F,
    base_topic: String,
    state: watch::Sender<ConnectionState>,
    backoff: Mutex<Backoff>,
    // Held for reading by every publish-or-buffer step, for writing by the
    // switch to CONNECTED. Refused records are therefore always in the
    // fallback store before the publisher checks that it is empty.
    handoff: RwLock<()>,
}

impl<T: Transport, F: FallbackStore> RemotePublisher<T, F> {
    pub fn new(transport: T, fallback: F, config: PublisherConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            fallback,
            base_topic: config.base_topic.trim_end_matches('/').to_string(),
            state,
            backoff: Mutex::new(Backoff::new(config.backoff_min, config.backoff_max)),
            handoff: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver following every state change.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    /// Delay the connection manager will wait before its next attempt.
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.backoff().current()
    }

    /// Telemetry topic of a category.
    #[must_use]
    pub fn topic(&self, category: Category) -> String {
        format!("{}/{}", self.base_topic, category.as_str())
    }

    /// Shared side of the hand-off gate.
    ///
    /// Hold it across [`publish`](Self::publish) and the fallback enqueue of
    /// a refused record.
    pub async fn submission_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.handoff.read().await
    }

    /// Publish one record.
    ///
    /// Never waits for connectivity: when not `Connected` the record is
    /// refused immediately.
    ///
    /// # Errors
    ///
    /// - [`PublishFailure::NotConnected`] when the publisher is not connected.
    /// - [`PublishFailure::Transport`] when the endpoint did not confirm; the
    ///   publisher drops to `Disconnected` and reconnects in the background.
    /// - [`PublishFailure::Encoding`] when the payload cannot be encoded.
    pub async fn publish(&self, record: &mut PublishRecord) -> Result<PublishAck, PublishFailure> {
        let state = self.state();
        if state != ConnectionState::Connected {
            return Err(PublishFailure::NotConnected);
        }
        self.send(record).await
    }

    /// Connection manager. Runs until `shutdown` fires, then disconnects.
    pub async fn run(&self, mut shutdown: Shutdown) {
        let mut first_attempt = true;
        loop {
            if !first_attempt {
                let delay = self.backoff().next_delay();
                tracing::info!(delay_ms = delay.as_millis(), "reconnecting after backoff");
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = shutdown.wait() => break,
                }
            }
            first_attempt = false;

            self.state.send_replace(ConnectionState::Connecting);
            let connected = tokio::select! {
                result = self.transport.connect() => result,
                () = shutdown.wait() => break,
            };
            if let Err(err) = connected {
                tracing::warn!(error = %err, "connection attempt failed");
                self.state.send_replace(ConnectionState::Disconnected);
                continue;
            }

            // Shutdown is honoured between replayed records, never mid-publish.
            match self.replay(&shutdown).await {
                Ok(count) => tracing::info!(replayed = count, "connected"),
                Err(ReplayError::Interrupted) => {
                    tracing::info!("replay stopped for shutdown");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "fallback replay interrupted");
                    self.go_offline().await;
                    continue;
                }
            }

            let mut state = self.state.subscribe();
            tokio::select! {
                () = self.transport.closed() => tracing::warn!("connection lost"),
                _ = state.wait_for(|s| *s != ConnectionState::Connected) => {
                    tracing::warn!("publish failed, reconnecting");
                }
                () = shutdown.wait() => break,
            }
            self.go_offline().await;
        }

        let _gate = self.handoff.write().await;
        self.state.send_replace(ConnectionState::Disconnected);
        self.transport.disconnect().await;
        tracing::info!("publisher stopped");
    }

    /// Replay the fallback store oldest-first, then switch to `Connected`
    /// once the store is observed empty under the write side of the gate.
    ///
    /// `shutdown` is checked between records only.
    async fn replay(&self, shutdown: &Shutdown) -> Result<usize, ReplayError> {
        let mut replayed = 0;
        loop {
            if shutdown.is_triggered() {
                return Err(ReplayError::Interrupted);
            }
            let batch = self
                .fallback
                .drain_for_replay()
                .await
                .map_err(ReplayError::Store)?;

            if batch.is_empty() {
                let _gate = self.handoff.write().await;
                let pending = self
                    .fallback
                    .pending_count()
                    .await
                    .map_err(ReplayError::Store)?;
                if pending == 0 {
                    self.state.send_replace(ConnectionState::Connected);
                    return Ok(replayed);
                }
                continue;
            }

            for mut record in batch {
                if shutdown.is_triggered() {
                    return Err(ReplayError::Interrupted);
                }
                match self.send(&mut record).await {
                    Ok(ack) => {
                        self.fallback
                            .mark_confirmed(ack.record_id)
                            .await
                            .map_err(ReplayError::Store)?;
                        replayed += 1;
                    }
                    Err(failure) => {
                        if let Err(err) = self.fallback.mark_failed(record.id).await {
                            tracing::warn!(error = %err, record_id = %record.id, "could not flag failed replay");
                        }
                        return Err(ReplayError::Publish(failure));
                    }
                }
            }
        }
    }

    async fn send(&self, record: &mut PublishRecord) -> Result<PublishAck, PublishFailure> {
        let line = record
            .payload
            .to_line()
            .map_err(|err| PublishFailure::Encoding(err.to_string()))?;
        let topic = self.topic(record.category());

        match self.transport.publish(&topic, line.into_bytes()).await {
            Ok(()) => {
                record.confirm();
                self.backoff().reset();
                tracing::debug!(record_id = %record.id, %topic, "record confirmed");
                Ok(PublishAck {
                    record_id: record.id,
                })
            }
            Err(err) => {
                record.fail();
                self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connected {
                        *state = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                Err(PublishFailure::Transport(err.to_string()))
            }
        }
    }

    async fn go_offline(&self) {
        {
            let _gate = self.handoff.write().await;
            self.state.send_replace(ConnectionState::Disconnected);
        }
        self.transport.disconnect().await;
    }

    fn backoff(&self) -> MutexGuard<'_, Backoff> {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
