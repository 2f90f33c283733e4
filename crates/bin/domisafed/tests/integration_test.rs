//! End-to-end tests for the full domisafed stack.
//!
//! Each test wires the real daily log store (in a temp dir), the real
//! `SQLite` fallback store (in memory) and the virtual actuators around a
//! scripted transport — no broker is contacted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use domisafe_adapter_log_file::DailyLogStore;
use domisafe_adapter_storage_sqlite_sqlx::SqliteFallbackStore;
use domisafe_adapter_storage_sqlite_sqlx::pool::{Config, Database};
use domisafe_adapter_virtual::{VirtualActuatorBank, VirtualMotionSensor};
use domisafe_app::ports::{Camera, CaptureError, FallbackStore, Transport, TransportError};
use domisafe_app::services::classifier::EventClassifier;
use domisafe_app::services::orchestrator::{Delivery, Orchestrator};
use domisafe_app::services::publisher::{ConnectionState, PublisherConfig, RemotePublisher};
use domisafe_app::services::sensor_reader::SensorReader;
use domisafe_app::shutdown;
use domisafe_domain::device::{DeviceCommand, DeviceState};
use domisafe_domain::id::{DeviceId, RecordId, SensorId};
use domisafe_domain::reading::{Measurement, Reading};
use domisafe_domain::record::{Payload, RecordIdGenerator};
use domisafe_domain::time::{self, Timestamp};

/// Transport whose broker can be switched on and off by the test.
#[derive(Default)]
struct ScriptedTransport {
    online: AtomicBool,
    published: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Connect("broker offline".to_string()))
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionLost);
        }
        let payload = String::from_utf8(payload).unwrap();
        self.published.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }

    async fn closed(&self) {
        std::future::pending::<()>().await;
    }

    async fn disconnect(&self) {}
}

/// Camera that never has a device attached.
struct NoCamera;

impl Camera for NoCamera {
    async fn capture(&self, _at: Timestamp) -> Result<String, CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

type Stack = Orchestrator<
    Arc<DailyLogStore>,
    Arc<ScriptedTransport>,
    SqliteFallbackStore,
    Arc<VirtualActuatorBank>,
>;

struct Harness {
    dir: TempDir,
    db: Database,
    log: Arc<DailyLogStore>,
    transport: Arc<ScriptedTransport>,
    actuators: Arc<VirtualActuatorBank>,
    orchestrator: Arc<Stack>,
}

fn led() -> DeviceId {
    DeviceId::new("led_green").unwrap()
}

async fn database() -> Database {
    Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise")
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = database().await;
    let log = Arc::new(DailyLogStore::open(dir.path()).unwrap());
    let transport = Arc::new(ScriptedTransport::default());
    let fallback = db.fallback_store();
    let ids = RecordIdGenerator::starting_after(fallback.last_record_id().await.unwrap());
    let publisher = Arc::new(RemotePublisher::new(
        Arc::clone(&transport),
        fallback,
        PublisherConfig {
            backoff_min: Duration::from_millis(10),
            backoff_max: Duration::from_millis(40),
            ..PublisherConfig::default()
        },
    ));
    let actuators = Arc::new(VirtualActuatorBank::new([led()]));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&log),
        publisher,
        Arc::clone(&actuators),
        ids,
        [led()],
    ));
    Harness {
        dir,
        db,
        log,
        transport,
        actuators,
        orchestrator,
    }
}

fn reference_reading() -> Payload {
    Payload::Reading(
        Reading::builder()
            .sensor_id(SensorId::new("dht11").unwrap())
            .timestamp(Utc.with_ymd_and_hms(2025, 11, 4, 16, 22, 15).unwrap())
            .measurement(Measurement::temperature_c(22.7))
            .measurement(Measurement::humidity_pct(55.2))
            .build()
            .unwrap(),
    )
}

const REFERENCE_LINE: &str =
    r#"{"timestamp":"2025-11-04T16:22:15Z","temperature":22.7,"humidity":55.2,"sensor_id":"dht11"}"#;

async fn wait_for_state(harness: &Harness, wanted: ConnectionState) {
    let mut state = harness.orchestrator.publisher().subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == wanted))
        .await
        .expect("publisher should reach the wanted state")
        .unwrap();
}

fn read_partition(harness: &Harness, name: &str) -> String {
    harness.log.flush_all().unwrap();
    std::fs::read_to_string(harness.dir.path().join(name)).unwrap()
}

// ---------------------------------------------------------------------------
// Connected / disconnected fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_log_and_publish_reading_when_connected() {
    let harness = harness().await;
    harness.transport.set_online(true);
    let (trigger, shutdown) = shutdown::channel();
    let publisher = Arc::clone(harness.orchestrator.publisher());
    let task = tokio::spawn(async move { publisher.run(shutdown).await });
    wait_for_state(&harness, ConnectionState::Connected).await;

    let delivery = harness.orchestrator.fan_out(reference_reading()).await;

    assert!(matches!(delivery, Delivery::Confirmed(_)));
    assert_eq!(
        read_partition(&harness, "20251104_environmental.txt"),
        format!("{REFERENCE_LINE}\n")
    );
    assert_eq!(
        harness.transport.published(),
        vec![("domisafe/environmental".to_string(), REFERENCE_LINE.to_string())]
    );
    let fallback = harness.orchestrator.publisher().fallback();
    assert_eq!(fallback.pending_count().await.unwrap(), 0);

    trigger.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn should_buffer_while_offline_and_replay_after_reconnect() {
    let harness = harness().await;

    let first = harness.orchestrator.fan_out(reference_reading()).await;
    let second = harness.orchestrator.fan_out(reference_reading()).await;

    assert!(matches!(first, Delivery::Buffered { .. }));
    assert!(matches!(second, Delivery::Buffered { .. }));
    let fallback = harness.orchestrator.publisher().fallback();
    assert_eq!(fallback.pending_count().await.unwrap(), 2);
    assert_eq!(
        read_partition(&harness, "20251104_environmental.txt").lines().count(),
        2
    );

    harness.transport.set_online(true);
    let (trigger, shutdown) = shutdown::channel();
    let publisher = Arc::clone(harness.orchestrator.publisher());
    let task = tokio::spawn(async move { publisher.run(shutdown).await });
    wait_for_state(&harness, ConnectionState::Connected).await;

    assert_eq!(fallback.pending_count().await.unwrap(), 0);
    assert_eq!(harness.transport.published().len(), 2);

    trigger.trigger();
    task.await.unwrap();
}

// ---------------------------------------------------------------------------
// Restart safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_continue_record_ids_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("fallback.db").display());

    let db = Config {
        database_url: url.clone(),
    }
    .build()
    .await
    .unwrap();
    let log = Arc::new(DailyLogStore::open(dir.path()).unwrap());
    let publisher = Arc::new(RemotePublisher::new(
        Arc::new(ScriptedTransport::default()),
        db.fallback_store(),
        PublisherConfig::default(),
    ));
    let orchestrator = Orchestrator::new(
        log,
        publisher,
        Arc::new(VirtualActuatorBank::new([])),
        RecordIdGenerator::default(),
        [],
    );
    for _ in 0..3 {
        orchestrator.fan_out(reference_reading()).await;
    }
    db.close().await;

    let reopened = Config { database_url: url }.build().await.unwrap();
    let store = reopened.fallback_store();
    let ids = RecordIdGenerator::starting_after(store.last_record_id().await.unwrap());

    assert_eq!(store.pending_count().await.unwrap(), 3);
    assert_eq!(ids.next_id(), RecordId::from_raw(4));
}

// ---------------------------------------------------------------------------
// Device commands & status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_actuate_device_and_record_state_change() {
    let harness = harness().await;
    let command = DeviceCommand {
        device_id: led(),
        requested_state: DeviceState::On,
        issued_at: time::now(),
    };

    let delivery = harness.orchestrator.handle_command(command).await.unwrap();

    assert!(matches!(delivery, Delivery::Buffered { .. }));
    assert_eq!(harness.actuators.state(&led()), Some(DeviceState::On));
    assert_eq!(
        harness.orchestrator.device_states(),
        vec![(led(), DeviceState::On)]
    );
    let fallback = harness.orchestrator.publisher().fallback();
    assert_eq!(fallback.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn should_reject_command_for_unknown_device() {
    let harness = harness().await;
    let command = DeviceCommand {
        device_id: DeviceId::new("garage_door").unwrap(),
        requested_state: DeviceState::On,
        issued_at: time::now(),
    };

    let result = harness.orchestrator.handle_command(command).await;

    assert!(result.is_err());
    let fallback = harness.orchestrator.publisher().fallback();
    assert_eq!(fallback.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn should_write_status_snapshot_to_log_only() {
    let harness = harness().await;

    let written = harness.orchestrator.snapshot_device_status();

    assert_eq!(written, 1);
    let fallback = harness.orchestrator.publisher().fallback();
    assert_eq!(fallback.pending_count().await.unwrap(), 0);
    let partition = harness
        .log
        .open_partitions()
        .into_iter()
        .find(|(category, _)| category.as_str() == "device-status");
    assert!(partition.is_some());
}

// ---------------------------------------------------------------------------
// Sensor tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_record_motion_event_without_camera() {
    let harness = harness().await;
    let reader = SensorReader::new(
        VirtualMotionSensor::new(SensorId::new("pir").unwrap(), 1),
        Duration::from_secs(1),
    );
    let mut classifier = EventClassifier::new(Some(NoCamera));

    let delivery = harness
        .orchestrator
        .poll_sensor(&reader, &mut classifier)
        .await;

    assert!(matches!(delivery, Some(Delivery::Buffered { .. })));
    let partition = harness
        .log
        .open_partitions()
        .into_iter()
        .find(|(category, _)| category.as_str() == "security");
    let (_, date) = partition.expect("security partition should be open");
    let content = read_partition(&harness, &format!("{}_security.txt", date.format("%Y%m%d")));
    assert!(content.contains(r#""motion_detected":true"#));
    assert!(content.contains("capture failed: camera unavailable"));
    harness.db.close().await;
}
