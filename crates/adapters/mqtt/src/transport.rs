//! rumqttc-backed [`Transport`].
//!
//! Each [`connect`](Transport::connect) starts a fresh client and event loop
//! driven by a background task. The driver resolves the in-flight publish on
//! its `PUBACK`, forwards device commands, and reports the session as lost
//! on the first connection error instead of reconnecting by itself: the
//! publisher owns the reconnect policy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use domisafe_app::ports::{Transport, TransportError};
use domisafe_domain::device::DeviceCommand;

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::topics;

const REQUEST_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Down,
    Up,
    Lost,
}

struct Inflight {
    pkid: Option<u16>,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// State shared between the transport and its event-loop driver.
struct Shared {
    link: watch::Sender<Link>,
    inflight: Mutex<Option<Inflight>>,
}

impl Shared {
    fn inflight(&self) -> MutexGuard<'_, Option<Inflight>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, done: oneshot::Sender<Result<(), TransportError>>) {
        *self.inflight() = Some(Inflight { pkid: None, done });
    }

    fn clear(&self) {
        self.inflight().take();
    }

    fn sent(&self, pkid: u16) {
        if let Some(inflight) = self.inflight().as_mut()
            && inflight.pkid.is_none()
        {
            inflight.pkid = Some(pkid);
        }
    }

    fn acked(&self, pkid: u16) {
        let mut slot = self.inflight();
        if slot.as_ref().and_then(|inflight| inflight.pkid) == Some(pkid)
            && let Some(inflight) = slot.take()
        {
            let _ = inflight.done.send(Ok(()));
        }
    }

    fn lost(&self) {
        self.link.send_if_modified(|link| {
            if *link == Link::Up {
                *link = Link::Lost;
                true
            } else {
                false
            }
        });
        if let Some(inflight) = self.inflight().take() {
            let _ = inflight.done.send(Err(TransportError::ConnectionLost));
        }
    }
}

struct Session {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

/// MQTT connection to the telemetry broker.
pub struct MqttTransport {
    config: MqttConfig,
    commands: mpsc::Sender<DeviceCommand>,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
    // One publish in flight at a time, so the next outgoing pkid is ours.
    publish_lock: tokio::sync::Mutex<()>,
}

impl MqttTransport {
    /// Create a transport that forwards incoming device commands to `commands`.
    #[must_use]
    pub fn new(config: MqttConfig, commands: mpsc::Sender<DeviceCommand>) -> Self {
        let (link, _) = watch::channel(Link::Down);
        Self {
            config,
            commands,
            shared: Arc::new(Shared {
                link,
                inflight: Mutex::new(None),
            }),
            session: Mutex::new(None),
            publish_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn client(&self) -> Result<AsyncClient, MqttError> {
        if *self.shared.link.borrow() != Link::Up {
            return Err(MqttError::NotConnected);
        }
        self.session()
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or(MqttError::NotConnected)
    }

    fn take_session(&self) -> Option<Session> {
        self.shared.link.send_replace(Link::Down);
        self.shared.clear();
        self.session().take()
    }
}

impl Transport for MqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if let Some(stale) = self.take_session() {
            stale.driver.abort();
        }

        let (client, eventloop) = AsyncClient::new(self.config.options(), REQUEST_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();
        let driver = tokio::spawn(drive(
            eventloop,
            client.clone(),
            Arc::clone(&self.shared),
            self.config.base_topic.clone(),
            self.commands.clone(),
            connack_tx,
        ));
        *self.session() = Some(Session { client, driver });
        tracing::debug!(
            host = %self.config.broker_host,
            port = self.config.broker_port,
            "connecting to MQTT broker"
        );

        let outcome = match tokio::time::timeout(self.config.connect_timeout(), connack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Connect("event loop stopped".to_string())),
            Err(_) => Err(TransportError::Timeout),
        };
        if outcome.is_err()
            && let Some(failed) = self.take_session()
        {
            failed.driver.abort();
        }
        outcome
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let _serial = self.publish_lock.lock().await;
        let client = self.client()?;

        let (done_tx, done_rx) = oneshot::channel();
        self.shared.begin(done_tx);
        if let Err(err) = client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
        {
            self.shared.clear();
            return Err(MqttError::Client(err).into());
        }

        match tokio::time::timeout(self.config.ack_timeout(), done_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ConnectionLost),
            Err(_) => {
                self.shared.clear();
                Err(TransportError::Timeout)
            }
        }
    }

    async fn closed(&self) {
        let mut link = self.shared.link.subscribe();
        let _ = link.wait_for(|state| *state == Link::Lost).await;
    }

    async fn disconnect(&self) {
        let Some(Session { client, mut driver }) = self.take_session() else {
            return;
        };
        if let Err(err) = client.try_disconnect() {
            tracing::debug!(error = %err, "MQTT disconnect request failed");
        }
        // Give the driver a moment to flush the DISCONNECT packet.
        if tokio::time::timeout(DISCONNECT_GRACE, &mut driver).await.is_err() {
            driver.abort();
        }
        tracing::info!("disconnected from MQTT broker");
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    base_topic: String,
    commands: mpsc::Sender<DeviceCommand>,
    connack: oneshot::Sender<Result<(), TransportError>>,
) {
    let mut connack = Some(connack);
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    if let Some(tx) = connack.take() {
                        let _ = tx.send(Err(TransportError::Connect(format!("{:?}", ack.code))));
                    }
                    break;
                }
                let filter = topics::command_filter(&base_topic);
                if let Err(err) = client.try_subscribe(&filter, QoS::AtLeastOnce) {
                    tracing::warn!(error = %err, %filter, "command subscription failed");
                }
                shared.link.send_replace(Link::Up);
                tracing::info!("connected to MQTT broker");
                if let Some(tx) = connack.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => shared.sent(pkid),
            Ok(Event::Incoming(Packet::PubAck(ack))) => shared.acked(ack.pkid),
            Ok(Event::Incoming(Packet::Publish(message))) => {
                forward_command(&base_topic, &message.topic, &message.payload, &commands);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "MQTT connection error");
                if let Some(tx) = connack.take() {
                    let _ = tx.send(Err(TransportError::Connect(err.to_string())));
                }
                shared.lost();
                break;
            }
        }
    }
}

fn forward_command(base_topic: &str, topic: &str, payload: &[u8], commands: &mpsc::Sender<DeviceCommand>) {
    match topics::parse_command(base_topic, topic, payload) {
        Ok(command) => {
            tracing::debug!(device = %command.device_id, state = %command.requested_state, "device command received");
            if let Err(err) = commands.try_send(command) {
                tracing::warn!(error = %err, "device command dropped");
            }
        }
        Err(err) => tracing::warn!(error = %err, %topic, "ignoring MQTT message"),
    }
}
