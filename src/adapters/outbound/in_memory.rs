use crate::common::{DomainError, DomainResult};
use crate::domains::fleet::{DevicePosition, PositionFix, RobotUnit};
use crate::domains::guidance::{Guide, NewGuide};
use crate::domains::mapping::{CampusMap, NewCampusMap};
use crate::domains::ports::{BusMessage, DeliveryReceipt, MessageBus, QoS, Repository};
use crate::domains::routing::{LocationTag, NewRoute, Route};
use crate::domains::topics::topic_matches;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

#[derive(Default)]
struct Tables {
    robots: BTreeMap<i64, RobotUnit>,
    devices: BTreeMap<i64, DevicePosition>,
    maps: BTreeMap<i64, CampusMap>,
    routes: BTreeMap<i64, Route>,
    guides: BTreeMap<i64, Guide>,
}

/// Process-local repository used by tests and the `memory` storage backend.
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_robot(&self, robot_id: i64) -> DomainResult<Option<RobotUnit>> {
        Ok(self.tables.read().await.robots.get(&robot_id).cloned())
    }

    async fn save_robot(&self, robot: &RobotUnit) -> DomainResult<()> {
        self.tables.write().await.robots.insert(robot.id, robot.clone());
        Ok(())
    }

    async fn robots_for_assistant(&self, assistant_id: i64) -> DomainResult<Vec<RobotUnit>> {
        let tables = self.tables.read().await;
        Ok(tables
            .robots
            .values()
            .filter(|r| r.assistant_id == Some(assistant_id))
            .cloned()
            .collect())
    }

    async fn get_device_position(&self, robot_id: i64) -> DomainResult<Option<DevicePosition>> {
        Ok(self.tables.read().await.devices.get(&robot_id).cloned())
    }

    async fn record_position(&self, robot_id: i64, fix: PositionFix) -> DomainResult<DevicePosition> {
        let mut tables = self.tables.write().await;
        let position = match tables.devices.get_mut(&robot_id) {
            Some(existing) => {
                existing.lat = fix.lat;
                existing.lng = fix.lng;
                if let Some(heading) = fix.heading_degrees {
                    existing.heading_degrees = heading;
                }
                existing.updated_at = Utc::now();
                existing.clone()
            }
            None => {
                let created = DevicePosition {
                    id: self.allocate_id(),
                    robot_id,
                    lat: fix.lat,
                    lng: fix.lng,
                    heading_degrees: fix.heading_degrees.unwrap_or(0.0),
                    updated_at: Utc::now(),
                };
                tables.devices.insert(robot_id, created.clone());
                created
            }
        };
        if let Some(robot) = tables.robots.get_mut(&robot_id) {
            robot.device_id = Some(position.id);
        }
        Ok(position)
    }

    async fn get_map(&self, map_id: i64) -> DomainResult<Option<CampusMap>> {
        Ok(self.tables.read().await.maps.get(&map_id).cloned())
    }

    async fn list_maps(&self) -> DomainResult<Vec<CampusMap>> {
        Ok(self.tables.read().await.maps.values().cloned().collect())
    }

    async fn insert_map(&self, map: NewCampusMap) -> DomainResult<CampusMap> {
        let created = map.into_map(self.allocate_id(), false);
        self.tables.write().await.maps.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_map(&self, map: &CampusMap) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .maps
            .get_mut(&map.id)
            .ok_or_else(|| DomainError::not_found("Map", map.id))?;
        *stored = CampusMap {
            is_primary: stored.is_primary,
            ..map.clone()
        };
        Ok(())
    }

    async fn set_primary_map(&self, map_id: i64) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.maps.contains_key(&map_id) {
            return Err(DomainError::not_found("Map", map_id));
        }
        for map in tables.maps.values_mut() {
            map.is_primary = map.id == map_id;
        }
        Ok(())
    }

    async fn primary_map(&self) -> DomainResult<Option<CampusMap>> {
        let tables = self.tables.read().await;
        Ok(tables.maps.values().find(|m| m.is_primary).cloned())
    }

    async fn get_route(&self, route_id: i64) -> DomainResult<Option<Route>> {
        Ok(self.tables.read().await.routes.get(&route_id).cloned())
    }

    async fn routes_between(&self, start: LocationTag, end: LocationTag) -> DomainResult<Vec<Route>> {
        let tables = self.tables.read().await;
        Ok(tables
            .routes
            .values()
            .filter(|r| r.start_tag == start && r.end_tag == end)
            .cloned()
            .collect())
    }

    async fn insert_route(&self, route: NewRoute) -> DomainResult<Route> {
        let created = route.into_route(self.allocate_id());
        self.tables.write().await.routes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_guide(&self, guide_id: i64) -> DomainResult<Option<Guide>> {
        Ok(self.tables.read().await.guides.get(&guide_id).cloned())
    }

    async fn active_guide_for_robot(&self, robot_id: i64) -> DomainResult<Option<Guide>> {
        let tables = self.tables.read().await;
        Ok(tables
            .guides
            .values()
            .find(|g| g.robot_id == robot_id && g.is_active())
            .cloned())
    }

    async fn insert_guide(&self, guide: NewGuide) -> DomainResult<Guide> {
        let mut tables = self.tables.write().await;
        if tables
            .guides
            .values()
            .any(|g| g.robot_id == guide.robot_id && g.is_active())
        {
            return Err(DomainError::invalid_state(format!(
                "Robot {} already has an active guide",
                guide.robot_id
            )));
        }
        let created = guide.into_guide(self.allocate_id());
        tables.guides.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_guide(&self, guide: &Guide) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .guides
            .get_mut(&guide.id)
            .ok_or_else(|| DomainError::not_found("Guide", guide.id))?;
        *stored = guide.clone();
        Ok(())
    }

    async fn guides_for_robot(&self, robot_id: i64) -> DomainResult<Vec<Guide>> {
        let tables = self.tables.read().await;
        let mut history: Vec<Guide> = tables
            .guides
            .values()
            .filter(|g| g.robot_id == robot_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }

    async fn list_guides(&self) -> DomainResult<Vec<Guide>> {
        Ok(self.tables.read().await.guides.values().cloned().collect())
    }

    async fn delete_guide(&self, guide_id: i64) -> DomainResult<bool> {
        Ok(self.tables.write().await.guides.remove(&guide_id).is_some())
    }
}

/// A publication seen by [`InMemoryBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Loopback bus: records every publication and fans it out to matching
/// subscribers. Connectivity and acknowledgment latency are switchable.
pub struct InMemoryBus {
    connected: AtomicBool,
    fail_publish: AtomicBool,
    ack_delay: Mutex<Option<Duration>>,
    published: Mutex<Vec<PublishedMessage>>,
    subscribers: Mutex<Vec<(String, mpsc::Sender<BusMessage>)>>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            fail_publish: AtomicBool::new(false),
            ack_delay: Mutex::new(None),
            published: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes every publish fail as if the broker rejected it.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn set_ack_delay(&self, delay: Option<Duration>) {
        *self.ack_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    /// Command names (`MOVE_FORWARD`, `TURN_LEFT`, ...) published so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.published()
            .iter()
            .filter_map(|m| m.json().get("command").and_then(|c| c.as_str()).map(String::from))
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Delivers a message to subscribers without recording it, as if a robot
    /// had published it.
    pub async fn inject(&self, topic: &str, payload: Vec<u8>) {
        self.fan_out(topic, &payload).await;
    }

    async fn fan_out(&self, topic: &str, payload: &[u8]) {
        let targets: Vec<mpsc::Sender<BusMessage>> = {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subscribers.retain(|(_, tx)| !tx.is_closed());
            subscribers
                .iter()
                .filter(|(pattern, _)| topic_matches(pattern, topic))
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in targets {
            let message = BusMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            };
            if tx.send(message).await.is_err() {
                tracing::debug!("Dropped message on {} for a closed subscriber", topic);
            }
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> DomainResult<DeliveryReceipt> {
        if !self.is_connected() {
            return Err(DomainError::Transport("in-memory bus disconnected".to_string()));
        }
        let delay = *self.ack_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(DomainError::Transport(format!("publish to {} rejected", topic)));
        }

        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.clone(),
                qos,
            });
        self.fan_out(topic, &payload).await;

        Ok(DeliveryReceipt {
            topic: topic.to_string(),
            delivered_at: Utc::now(),
            offset: None,
        })
    }

    async fn subscribe(&self, pattern: &str) -> DomainResult<mpsc::Receiver<BusMessage>> {
        let (tx, rx) = mpsc::channel(256);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((pattern.to_string(), tx));
        Ok(rx)
    }
}
