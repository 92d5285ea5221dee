use crate::application::{NavigationService, StatusReport};
use crate::common::{DomainError, DomainResult};
use crate::domains::fleet::OperationalState;
use crate::domains::geodesy::cardinal_to_angle;
use crate::domains::ports::{BusMessage, MessageBus};
use crate::domains::topics::{any_robot_topic, parse_robot_topic};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

pub const LOCATION_CHANNEL: &str = "location";
pub const STATUS_CHANNEL: &str = "status";
pub const BATTERY_CHANNEL: &str = "battery";

/// Pending messages per robot before new ones are dropped.
const ROBOT_QUEUE: usize = 32;

/// Heading as robots send it: degrees, or a cardinal label such as "NE".
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Heading {
    Degrees(f64),
    Label(String),
}

impl Heading {
    fn degrees(&self) -> f64 {
        match self {
            Heading::Degrees(d) => *d,
            Heading::Label(label) => cardinal_to_angle(label),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationPayload {
    lat: f64,
    lng: f64,
    #[serde(default, alias = "heading")]
    cardinal_direction: Option<Heading>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    #[serde(default, alias = "estado", alias = "state")]
    status: Option<String>,
    #[serde(default, alias = "battery")]
    battery_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BatteryPayload {
    level: f64,
}

/// Feeds robot telemetry from the bus into the navigation service:
/// positions drive guides forward, status and battery update the fleet.
pub struct TelemetryListener {
    service: Arc<NavigationService>,
    bus: Arc<dyn MessageBus>,
}

impl TelemetryListener {
    pub fn new(service: Arc<NavigationService>, bus: Arc<dyn MessageBus>) -> Self {
        Self { service, bus }
    }

    /// Subscribes to every robot's telemetry channels. Each channel task fans
    /// messages out to one worker per robot, so robots are handled
    /// concurrently while one robot's messages keep their arrival order.
    pub async fn start(self) -> DomainResult<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        for channel in [LOCATION_CHANNEL, STATUS_CHANNEL, BATTERY_CHANNEL] {
            let pattern = any_robot_topic(channel);
            let mut rx = self.bus.subscribe(&pattern).await?;
            let service = self.service.clone();

            handles.push(tokio::spawn(async move {
                let mut workers: HashMap<i64, mpsc::Sender<BusMessage>> = HashMap::new();
                while let Some(message) = rx.recv().await {
                    let Some((robot_id, _)) = parse_robot_topic(&message.topic) else {
                        tracing::warn!("Telemetry on {} rejected: not a robot topic", message.topic);
                        continue;
                    };
                    let worker = workers
                        .entry(robot_id)
                        .or_insert_with(|| spawn_robot_worker(service.clone()));
                    match worker.try_send(message) {
                        Ok(()) => {}
                        Err(TrySendError::Full(dropped)) => {
                            tracing::warn!("Robot {} is behind, dropped telemetry on {}", robot_id, dropped.topic);
                        }
                        Err(TrySendError::Closed(message)) => {
                            let worker = spawn_robot_worker(service.clone());
                            if worker.try_send(message).is_err() {
                                tracing::warn!("Telemetry worker for robot {} unavailable", robot_id);
                            }
                            workers.insert(robot_id, worker);
                        }
                    }
                }
                tracing::info!("Telemetry subscription {} closed", pattern);
            }));
        }
        Ok(handles)
    }
}

fn spawn_robot_worker(service: Arc<NavigationService>) -> mpsc::Sender<BusMessage> {
    let (tx, mut rx) = mpsc::channel::<BusMessage>(ROBOT_QUEUE);
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = handle_message(&service, &message).await {
                tracing::warn!("Telemetry on {} rejected: {}", message.topic, e);
            }
        }
    });
    tx
}

/// Decodes one telemetry message and applies it.
pub async fn handle_message(service: &NavigationService, message: &BusMessage) -> DomainResult<()> {
    let (robot_id, channel) = parse_robot_topic(&message.topic)
        .ok_or_else(|| DomainError::validation(format!("Not a robot topic: {}", message.topic)))?;

    match channel {
        LOCATION_CHANNEL => {
            let payload: LocationPayload = serde_json::from_slice(&message.payload)?;
            let heading = payload.cardinal_direction.as_ref().map(Heading::degrees);
            let step = service
                .advance_on_telemetry(robot_id, payload.lat, payload.lng, heading)
                .await?;
            if let Some(progress) = step.progress() {
                tracing::debug!(
                    "Robot {} guide {} at {:.0}%",
                    robot_id,
                    progress.guide_id,
                    progress.progress_percent
                );
            }
        }
        STATUS_CHANNEL => {
            let payload: StatusPayload = serde_json::from_slice(&message.payload)?;
            let state = payload
                .status
                .as_deref()
                .map(str::parse::<OperationalState>)
                .transpose()?;
            service
                .record_status(
                    robot_id,
                    StatusReport {
                        state,
                        battery_level: payload.battery_level,
                    },
                )
                .await?;
        }
        BATTERY_CHANNEL => {
            let payload: BatteryPayload = serde_json::from_slice(&message.payload)?;
            service.record_battery(robot_id, payload.level).await?;
        }
        other => {
            tracing::debug!("Ignoring telemetry channel {} for robot {}", other, robot_id);
        }
    }
    Ok(())
}
