//! Orchestrator — per-sensor fan-out, device commands and status snapshots.
//!
//! Every record goes through the same path: append to the local log, then
//! publish, and buffer in the fallback store when the publish is refused.
//! Momentary devices switch themselves back off after a hold time and that
//! revert travels the same path.
//! Each sensor, the command listener, the status reporter and the
//! connectivity indicator run as independent tasks so that one slow or
//! failing collaborator never stalls another.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use domisafe_domain::device::{DeviceCommand, DeviceState, DeviceStatus};
use domisafe_domain::error::{DomiSafeError, NotFoundError, PublishFailure};
use domisafe_domain::event::Event;
use domisafe_domain::id::{DeviceId, RecordId};
use domisafe_domain::reading::SensorKind;
use domisafe_domain::record::{Payload, PublishRecord, RecordIdGenerator};
use domisafe_domain::time;

use crate::ports::{Actuator, Camera, FallbackStore, RecordLog, Sensor, Transport};
use crate::services::classifier::EventClassifier;
use crate::services::publisher::{ConnectionState, PublishAck, RemotePublisher};
use crate::services::sensor_reader::SensorReader;
use crate::shutdown::Shutdown;

/// What happened to a fanned-out record on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The endpoint confirmed it.
    Confirmed(PublishAck),
    /// Refused, now waiting in the fallback store.
    Buffered {
        record_id: RecordId,
        failure: PublishFailure,
    },
    /// Refused and the fallback store could not take it either. The record
    /// only exists in the local log.
    Lost {
        record_id: RecordId,
        failure: PublishFailure,
    },
}

impl Delivery {
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Confirmed(ack) => ack.record_id,
            Self::Buffered { record_id, .. } | Self::Lost { record_id, .. } => *record_id,
        }
    }
}

/// Devices driven by the connectivity indicator.
#[derive(Debug, Clone, Default)]
pub struct Indicator {
    /// Switched on while connected.
    pub online: Option<DeviceId>,
    /// Switched on while not connected.
    pub offline: Option<DeviceId>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DeviceSlot {
    state: DeviceState,
    /// Bumped by every command, so a pending momentary revert can tell it
    /// was superseded.
    generation: u64,
}

pub struct Orchestrator<L, T, F, A> {
    log: L,
    publisher: Arc<RemotePublisher<T, F>>,
    actuator: A,
    ids: RecordIdGenerator,
    devices: Mutex<BTreeMap<DeviceId, DeviceSlot>>,
    momentary: BTreeMap<DeviceId, Duration>,
    // Serialises command switching with momentary reverts.
    switching: tokio::sync::Mutex<()>,
}

impl<L, T, F, A> Orchestrator<L, T, F, A>
where
    L: RecordLog,
    T: Transport,
    F: FallbackStore,
    A: Actuator,
{
    /// Every device starts `off` until a command says otherwise.
    pub fn new(
        log: L,
        publisher: Arc<RemotePublisher<T, F>>,
        actuator: A,
        ids: RecordIdGenerator,
        devices: impl IntoIterator<Item = DeviceId>,
    ) -> Self {
        Self {
            log,
            publisher,
            actuator,
            ids,
            devices: Mutex::new(
                devices
                    .into_iter()
                    .map(|id| (id, DeviceSlot::default()))
                    .collect(),
            ),
            momentary: BTreeMap::new(),
            switching: tokio::sync::Mutex::new(()),
        }
    }

    /// Devices in momentary mode: an `on` command is followed by an
    /// automatic `off` once the hold time has elapsed.
    #[must_use]
    pub fn with_momentary(mut self, holds: impl IntoIterator<Item = (DeviceId, Duration)>) -> Self {
        self.momentary.extend(holds);
        self
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<RemotePublisher<T, F>> {
        &self.publisher
    }

    /// Last known state of every configured device.
    #[must_use]
    pub fn device_states(&self) -> Vec<(DeviceId, DeviceState)> {
        self.devices()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.state))
            .collect()
    }

    /// Log, then publish or buffer one payload.
    ///
    /// A local log failure is reported and does not stop the remote path.
    pub async fn fan_out(&self, payload: Payload) -> Delivery {
        let record_id = self.ids.next_id();
        let category = payload.category();
        if let Err(err) = self.log.append(&payload) {
            tracing::warn!(error = %err, %category, %record_id, "local log append failed");
        }

        let mut record = PublishRecord::new(record_id, payload);
        let _gate = self.publisher.submission_gate().await;
        let failure = match self.publisher.publish(&mut record).await {
            Ok(ack) => return Delivery::Confirmed(ack),
            Err(failure) => failure,
        };

        match self.publisher.fallback().enqueue(&record).await {
            Ok(()) => {
                tracing::debug!(%record_id, %category, reason = %failure, "record buffered");
                Delivery::Buffered { record_id, failure }
            }
            Err(err) => {
                tracing::error!(error = %err, %record_id, %category, "durable write failed, record kept in local log only");
                Delivery::Lost { record_id, failure }
            }
        }
    }

    /// Poll one sensor and fan out what it produced.
    ///
    /// Returns `None` when the poll failed or the classifier produced no
    /// event.
    pub async fn poll_sensor<S, C>(
        &self,
        reader: &SensorReader<S>,
        classifier: &mut EventClassifier<C>,
    ) -> Option<Delivery>
    where
        S: Sensor,
        C: Camera,
    {
        let reading = match reader.poll().await {
            Ok(reading) => reading,
            Err(failure) => {
                tracing::warn!(sensor = %failure.sensor_id, reason = %failure.reason, "sensor read failed");
                return None;
            }
        };

        let payload = match reader.kind() {
            SensorKind::Environmental => Payload::Reading(reading),
            SensorKind::Motion => Payload::Event(classifier.classify(&reading).await?),
        };
        Some(self.fan_out(payload).await)
    }

    /// Drive the actuator and record the new state. Callers hold
    /// `switching`.
    async fn switch(&self, device_id: &DeviceId, state: DeviceState) -> Result<u64, DomiSafeError> {
        if !self.devices().contains_key(device_id) {
            return Err(NotFoundError::device(device_id).into());
        }
        self.actuator.set_state(device_id, state).await?;
        let mut devices = self.devices();
        let slot = devices.entry(device_id.clone()).or_default();
        slot.state = state;
        slot.generation += 1;
        tracing::info!(device = %device_id, %state, "device actuated");
        Ok(slot.generation)
    }

    async fn announce(&self, device_id: DeviceId, state: DeviceState) -> Delivery {
        let event = Event::device_state_change(device_id, state, time::now());
        self.fan_out(Payload::Event(event)).await
    }

    fn generation(&self, device_id: &DeviceId) -> Option<u64> {
        self.devices().get(device_id).map(|slot| slot.generation)
    }

    /// Append one `device-status` line per configured device to the local
    /// log. Snapshots are never published.
    pub fn snapshot_device_status(&self) -> usize {
        let timestamp = time::now();
        let mut written = 0;
        for (device_id, state) in self.device_states() {
            let payload = Payload::Status(DeviceStatus {
                device_id,
                state,
                timestamp,
            });
            match self.log.append(&payload) {
                Ok(()) => written += 1,
                Err(err) => tracing::warn!(error = %err, "device status snapshot failed"),
            }
        }
        written
    }

    async fn show_connectivity(&self, indicator: &Indicator, connected: bool) {
        let wanted = [
            (indicator.online.as_ref(), connected),
            (indicator.offline.as_ref(), !connected),
        ];
        for (device_id, on) in wanted {
            let Some(device_id) = device_id else {
                continue;
            };
            let state = if on { DeviceState::On } else { DeviceState::Off };
            if let Err(err) = self.actuator.set_state(device_id, state).await {
                tracing::warn!(error = %err, device = %device_id, "indicator update failed");
                continue;
            }
            if let Some(known) = self.devices().get_mut(device_id) {
                known.state = state;
            }
        }
    }

    fn devices(&self) -> MutexGuard<'_, BTreeMap<DeviceId, DeviceSlot>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L, T, F, A> Orchestrator<L, T, F, A>
where
    L: RecordLog + 'static,
    T: Transport + 'static,
    F: FallbackStore + 'static,
    A: Actuator + 'static,
{
    /// Actuate a device and fan out the resulting state change.
    ///
    /// An `on` command for a momentary device also schedules the switch back
    /// to `off`. Any later command for the same device cancels that revert.
    ///
    /// # Errors
    ///
    /// - [`DomiSafeError::NotFound`] for a device that is not configured.
    /// - Whatever the actuator reports. No event is produced in either case.
    pub async fn handle_command(self: &Arc<Self>, command: DeviceCommand) -> Result<Delivery, DomiSafeError> {
        let DeviceCommand {
            device_id,
            requested_state,
            ..
        } = command;

        let generation = {
            let _switching = self.switching.lock().await;
            self.switch(&device_id, requested_state).await?
        };
        let delivery = self.announce(device_id.clone(), requested_state).await;
        if requested_state == DeviceState::On
            && let Some(hold) = self.momentary.get(&device_id).copied()
        {
            self.schedule_revert(device_id, hold, generation);
        }
        Ok(delivery)
    }

    fn schedule_revert(self: &Arc<Self>, device_id: DeviceId, hold: Duration, generation: u64) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            {
                let _switching = this.switching.lock().await;
                if this.generation(&device_id) != Some(generation) {
                    tracing::debug!(device = %device_id, "momentary revert superseded");
                    return;
                }
                if let Err(err) = this.switch(&device_id, DeviceState::Off).await {
                    tracing::warn!(error = %err, device = %device_id, "momentary revert failed");
                    return;
                }
            }
            this.announce(device_id, DeviceState::Off).await;
        });
    }

    /// Periodic poll task for one sensor. The first poll happens immediately.
    pub fn spawn_sensor<S, C>(
        self: &Arc<Self>,
        reader: SensorReader<S>,
        mut classifier: EventClassifier<C>,
        period: Duration,
        mut shutdown: Shutdown,
    ) -> JoinHandle<()>
    where
        S: Sensor + 'static,
        C: Camera + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.poll_sensor(&reader, &mut classifier).await;
                    }
                    () = shutdown.wait() => break,
                }
            }
            tracing::debug!(sensor = %reader.sensor_id(), "sensor task stopped");
        })
    }

    /// Consume device commands until the channel closes or shutdown fires.
    pub fn spawn_command_listener(
        self: &Arc<Self>,
        mut commands: mpsc::Receiver<DeviceCommand>,
        mut shutdown: Shutdown,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    command = commands.recv() => command,
                    () = shutdown.wait() => break,
                };
                let Some(command) = command else {
                    break;
                };
                let device = command.device_id.clone();
                if let Err(err) = this.handle_command(command).await {
                    tracing::warn!(error = %err, %device, "device command rejected");
                }
            }
            tracing::debug!("command listener stopped");
        })
    }

    /// Write device-status snapshots every `period`, starting one period
    /// from now.
    pub fn spawn_status_reporter(self: &Arc<Self>, period: Duration, mut shutdown: Shutdown) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let written = this.snapshot_device_status();
                        tracing::debug!(written, "device status snapshot");
                    }
                    () = shutdown.wait() => break,
                }
            }
        })
    }

    /// Mirror the publisher's connection state on the indicator devices.
    pub fn spawn_connectivity_indicator(
        self: &Arc<Self>,
        indicator: Indicator,
        mut shutdown: Shutdown,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut state = this.publisher.subscribe_state();
            let mut shown = None;
            loop {
                let connected = *state.borrow_and_update() == ConnectionState::Connected;
                if shown != Some(connected) {
                    this.show_connectivity(&indicator, connected).await;
                    shown = Some(connected);
                }
                tokio::select! {
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = shutdown.wait() => break,
                }
            }
        })
    }
}
