use super::events::NavigationEvent;
use super::projections::{FleetProjectionStore, RobotOverview};
use crate::common::{DomainEvent, EventEnvelope, EventMetadata};
use crate::domains::ports::{MessageBus, QoS};
use crate::domains::topics::robot_topic;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub const EVENTS_CHANNEL: &str = "events";

/// Cloneable handle services use to emit navigation events. A disabled
/// handle drops events silently.
#[derive(Clone, Default)]
pub struct NavigationEventSender {
    sender: Option<mpsc::Sender<NavigationEvent>>,
}

impl NavigationEventSender {
    pub fn new(sender: mpsc::Sender<NavigationEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub async fn emit(&self, event: NavigationEvent) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.send(event).await {
                tracing::warn!("Navigation event dropped, actor stopped: {}", e);
            }
        }
    }
}

pub fn navigation_event_channel(
    capacity: usize,
) -> (NavigationEventSender, mpsc::Receiver<NavigationEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (NavigationEventSender::new(tx), rx)
}

/// Folds navigation events into the fleet overview and forwards them, as
/// envelopes, to `robots/{id}/events` when a bus is attached.
pub struct NavigationEventActor {
    bus: Option<Arc<dyn MessageBus>>,
    projection_store: Arc<RwLock<FleetProjectionStore>>,
    event_receiver: mpsc::Receiver<NavigationEvent>,
}

impl NavigationEventActor {
    pub fn new(event_receiver: mpsc::Receiver<NavigationEvent>) -> Self {
        Self {
            bus: None,
            projection_store: Arc::new(RwLock::new(FleetProjectionStore::new())),
            event_receiver,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Shared view of the projections, readable while the actor runs.
    pub fn projections(&self) -> Arc<RwLock<FleetProjectionStore>> {
        self.projection_store.clone()
    }

    pub async fn run(mut self) {
        while let Some(event) = self.event_receiver.recv().await {
            if let Err(e) = self.handle_event(event).await {
                tracing::error!("Failed to handle navigation event: {}", e);
            }
        }
        tracing::debug!("Navigation event actor stopped");
    }

    async fn handle_event(&self, event: NavigationEvent) -> Result<(), String> {
        {
            let mut store = self.projection_store.write().await;
            store.apply_event(&event);
        }

        if let Some(bus) = &self.bus {
            let metadata = EventMetadata {
                correlation_id: Some(Uuid::new_v4()),
                source: "NavigationEventActor".to_string(),
            };
            let envelope = EventEnvelope::new(&event, "Robot", metadata)
                .map_err(|e| format!("Failed to create event envelope: {}", e))?;
            let payload = serde_json::to_vec(&envelope)
                .map_err(|e| format!("Failed to serialize event envelope: {}", e))?;
            let topic = robot_topic(event.aggregate_id(), EVENTS_CHANNEL);
            bus.publish(&topic, payload, QoS::AtLeastOnce)
                .await
                .map_err(|e| format!("Failed to forward {}: {}", event.event_type(), e))?;
        }

        tracing::debug!("Handled navigation event: {}", event.event_type());
        Ok(())
    }

    pub async fn robot_overview(&self, robot_id: i64) -> Option<RobotOverview> {
        let store = self.projection_store.read().await;
        store.robots.get(&robot_id).cloned()
    }
}
