//! In-memory port implementations shared by the service tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use domisafe_domain::device::DeviceState;
use domisafe_domain::error::DomiSafeError;
use domisafe_domain::id::{DeviceId, RecordId, SensorId};
use domisafe_domain::reading::{Measurement, SensorKind};
use domisafe_domain::record::{DeliveryState, Payload, PublishRecord};
use domisafe_domain::time::Timestamp;

use crate::ports::{
    Actuator, Camera, CaptureError, FallbackStore, RecordLog, Sensor, SensorError, Transport,
    TransportError,
};

#[derive(Debug, thiserror::Error)]
#[error("injected failure")]
pub struct Injected;

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

pub struct FakeSensor {
    id: SensorId,
    kind: SensorKind,
    delay: Option<Duration>,
    script: Mutex<VecDeque<Result<Vec<Measurement>, SensorError>>>,
}

impl FakeSensor {
    pub fn new(id: &str, kind: SensorKind) -> Self {
        Self {
            id: SensorId::new(id).unwrap(),
            kind,
            delay: None,
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn then(self, outcome: Result<Vec<Measurement>, SensorError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }
}

impl Sensor for FakeSensor {
    fn id(&self) -> &SensorId {
        &self.id
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    async fn poll(&self) -> Result<Vec<Measurement>, SensorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SensorError::NotReady("script exhausted".to_string())))
    }
}

// ---------------------------------------------------------------------------
// Record log
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SpyLog {
    pub fail: AtomicBool,
    appended: Mutex<Vec<Payload>>,
    flushes: AtomicUsize,
}

impl SpyLog {
    pub fn appended(&self) -> Vec<Payload> {
        self.appended.lock().unwrap().clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl RecordLog for SpyLog {
    fn append(&self, payload: &Payload) -> Result<(), DomiSafeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomiSafeError::Storage(Box::new(Injected)));
        }
        self.appended.lock().unwrap().push(payload.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), DomiSafeError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fallback store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryFallback {
    pub fail: AtomicBool,
    rows: Mutex<Vec<(PublishRecord, u32)>>,
    highest: Mutex<Option<RecordId>>,
}

impl InMemoryFallback {
    pub fn ids(&self) -> Vec<u64> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|(record, _)| record.id.as_u64())
            .collect()
    }

    pub fn attempts(&self, id: u64) -> Option<u32> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|(record, _)| record.id.as_u64() == id)
            .map(|(_, attempts)| *attempts)
    }

    fn check(&self) -> Result<(), DomiSafeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomiSafeError::Storage(Box::new(Injected)));
        }
        Ok(())
    }
}

impl FallbackStore for InMemoryFallback {
    async fn enqueue(&self, record: &PublishRecord) -> Result<(), DomiSafeError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if !rows.iter().any(|(row, _)| row.id == record.id) {
            let mut stored = record.clone();
            stored.delivery_state = DeliveryState::Pending;
            rows.push((stored, 0));
        }
        let mut highest = self.highest.lock().unwrap();
        *highest = (*highest).max(Some(record.id));
        Ok(())
    }

    async fn mark_confirmed(&self, id: RecordId) -> Result<(), DomiSafeError> {
        self.check()?;
        self.rows.lock().unwrap().retain(|(row, _)| row.id != id);
        Ok(())
    }

    async fn mark_failed(&self, id: RecordId) -> Result<(), DomiSafeError> {
        self.check()?;
        for (row, attempts) in self.rows.lock().unwrap().iter_mut() {
            if row.id == id {
                row.delivery_state = DeliveryState::Failed;
                *attempts += 1;
            }
        }
        Ok(())
    }

    async fn drain_for_replay(&self) -> Result<Vec<PublishRecord>, DomiSafeError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|(row, _)| row.clone())
            .collect())
    }

    async fn pending_count(&self) -> Result<u64, DomiSafeError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().len() as u64)
    }

    async fn last_record_id(&self) -> Result<Option<RecordId>, DomiSafeError> {
        self.check()?;
        Ok(*self.highest.lock().unwrap())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTransport {
    pub refuse_connect: AtomicBool,
    pub fail_publish: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    published: Mutex<Vec<(String, String)>>,
    publish_delay: Mutex<Duration>,
    closed: Notify,
}

impl FakeTransport {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Time every publish takes before the broker acknowledges it.
    pub fn set_publish_delay(&self, delay: Duration) {
        *self.publish_delay.lock().unwrap() = delay;
    }

    /// Simulate the broker dropping the session.
    pub fn drop_link(&self) {
        self.closed.notify_one();
    }
}

impl Transport for FakeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("refused".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let delay = *self.publish_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionLost);
        }
        let payload = String::from_utf8(payload).unwrap();
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn closed(&self) {
        self.closed.notified().await;
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SpyActuator {
    pub fail: AtomicBool,
    calls: Mutex<Vec<(DeviceId, DeviceState)>>,
}

impl SpyActuator {
    pub fn calls(&self) -> Vec<(DeviceId, DeviceState)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Actuator for SpyActuator {
    async fn set_state(&self, device_id: &DeviceId, state: DeviceState) -> Result<(), DomiSafeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomiSafeError::Device(Box::new(Injected)));
        }
        self.calls.lock().unwrap().push((device_id.clone(), state));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCamera {
    pub fail: AtomicBool,
    captures: AtomicUsize,
}

impl FakeCamera {
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl Camera for FakeCamera {
    async fn capture(&self, at: Timestamp) -> Result<String, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable);
        }
        Ok(format!("captured_images/motion_{}.jpg", at.format("%Y%m%d_%H%M%S")))
    }
}
