//! # domisafed — DomiSafe daemon
//!
//! Composition root that wires all adapters together and runs the
//! orchestrator until it is told to stop.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise tracing
//! - Open the daily log directory and the `SQLite` fallback store (fatal on failure)
//! - Seed record ids from the fallback store so they survive restarts
//! - Construct the MQTT transport, publisher and orchestrator
//! - Spawn the publisher, flusher, sensor, command, status and indicator tasks
//! - Handle graceful shutdown (SIGTERM/SIGINT) within a grace period
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use domisafe_adapter_log_file::{DailyLogStore, spawn_flusher};
use domisafe_adapter_mqtt::MqttTransport;
use domisafe_adapter_storage_sqlite_sqlx::SqliteFallbackStore;
use domisafe_adapter_storage_sqlite_sqlx::pool::Config as DatabaseConfig;
use domisafe_adapter_virtual::{
    VirtualActuatorBank, VirtualCamera, VirtualEnvironmentalSensor, VirtualMotionSensor,
};
use domisafe_app::ports::{FallbackStore, Sensor, Transport};
use domisafe_app::services::classifier::EventClassifier;
use domisafe_app::services::orchestrator::{Indicator, Orchestrator};
use domisafe_app::services::publisher::RemotePublisher;
use domisafe_app::services::sensor_reader::SensorReader;
use domisafe_app::shutdown::{self, Shutdown};
use domisafe_domain::reading::SensorKind;
use domisafe_domain::record::RecordIdGenerator;

use crate::config::{Config, SensorConfig};

const COMMAND_CAPACITY: usize = 32;

type Daemon = Orchestrator<
    Arc<DailyLogStore>,
    Arc<MqttTransport>,
    SqliteFallbackStore,
    Arc<VirtualActuatorBank>,
>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Storage
    let log_store = Arc::new(DailyLogStore::open(&config.storage.log_dir)?);
    let db = DatabaseConfig {
        database_url: config.storage.database_url.clone(),
    }
    .build()
    .await?;
    let fallback = db.fallback_store();
    let ids = RecordIdGenerator::starting_after(fallback.last_record_id().await?);
    tracing::info!(
        log_dir = %log_store.dir().display(),
        pending = fallback.pending_count().await?,
        "storage ready"
    );

    // Transport & services
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let transport = Arc::new(MqttTransport::new(config.mqtt.clone(), command_tx));
    let publisher = Arc::new(RemotePublisher::new(
        Arc::clone(&transport),
        fallback,
        config.publisher(),
    ));
    let actuators = Arc::new(VirtualActuatorBank::new(config.devices.names.clone()));
    let orchestrator: Arc<Daemon> = Arc::new(Orchestrator::new(
        Arc::clone(&log_store),
        Arc::clone(&publisher),
        actuators,
        ids,
        config.devices.names.clone(),
    )
    .with_momentary(config.momentary()));

    // Tasks
    let (trigger, shutdown) = shutdown::channel();
    let mut tasks = Vec::new();
    {
        let publisher = Arc::clone(&publisher);
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move { publisher.run(shutdown).await }));
    }
    tasks.push(spawn_flusher(
        Arc::clone(&log_store),
        config.flush_interval(),
        shutdown.clone(),
    ));
    tasks.extend(spawn_sensors(&orchestrator, &config, &shutdown));
    tasks.push(orchestrator.spawn_command_listener(command_rx, shutdown.clone()));
    tasks.push(orchestrator.spawn_status_reporter(config.status_interval(), shutdown.clone()));
    let indicator = Indicator {
        online: config.indicator.online_device.clone(),
        offline: config.indicator.offline_device.clone(),
    };
    if indicator.online.is_some() || indicator.offline.is_some() {
        tasks.push(orchestrator.spawn_connectivity_indicator(indicator, shutdown.clone()));
    }
    tracing::info!(sensors = config.sensors.len(), "domisafed running");

    wait_for_signal().await;
    tracing::info!("shutdown requested");
    trigger.trigger();
    join_within(tasks, config.grace_period()).await;

    if let Err(err) = log_store.close() {
        tracing::error!(error = %err, "final log flush failed");
    }
    transport.disconnect().await;
    db.close().await;
    tracing::info!("domisafed stopped");
    Ok(())
}

fn spawn_sensors(orchestrator: &Arc<Daemon>, config: &Config, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
    let camera = config
        .camera
        .enabled
        .then(|| Arc::new(VirtualCamera::new(config.camera.image_dir.clone())));

    config
        .sensors
        .iter()
        .map(|sensor| match sensor.kind {
            SensorKind::Environmental => {
                let mut device = VirtualEnvironmentalSensor::new(sensor.id.clone());
                if let Some(n) = sensor.fail_every {
                    device = device.failing_every(n);
                }
                spawn_sensor(orchestrator, sensor, device, None, shutdown)
            }
            SensorKind::Motion => {
                let device = VirtualMotionSensor::new(sensor.id.clone(), sensor.motion_every);
                spawn_sensor(orchestrator, sensor, device, camera.clone(), shutdown)
            }
        })
        .collect()
}

fn spawn_sensor<S>(
    orchestrator: &Arc<Daemon>,
    sensor: &SensorConfig,
    device: S,
    camera: Option<Arc<VirtualCamera>>,
    shutdown: &Shutdown,
) -> JoinHandle<()>
where
    S: Sensor + 'static,
{
    tracing::info!(sensor = %sensor.id, kind = ?sensor.kind, interval_secs = sensor.interval_secs, "starting sensor");
    orchestrator.spawn_sensor(
        SensorReader::new(device, sensor.timeout()),
        EventClassifier::new(camera).with_debounce(sensor.debounce()),
        sensor.interval(),
        shutdown.clone(),
    )
}

async fn join_within(tasks: Vec<JoinHandle<()>>, grace: std::time::Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for mut task in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "task ended abnormally"),
            Err(_) => {
                tracing::warn!("task still running after the grace period, aborting");
                task.abort();
            }
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
