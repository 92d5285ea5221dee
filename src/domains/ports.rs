use crate::common::DomainResult;
use crate::domains::fleet::{DevicePosition, PositionFix, RobotUnit};
use crate::domains::guidance::{Guide, NewGuide};
use crate::domains::mapping::{CampusMap, NewCampusMap};
use crate::domains::routing::{LocationTag, NewRoute, Route};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Storage port for everything the navigation core reads and writes.
/// Absence is reported as `Ok(None)`, never as an error.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_robot(&self, robot_id: i64) -> DomainResult<Option<RobotUnit>>;
    /// Inserts or replaces the robot row.
    async fn save_robot(&self, robot: &RobotUnit) -> DomainResult<()>;
    async fn robots_for_assistant(&self, assistant_id: i64) -> DomainResult<Vec<RobotUnit>>;

    async fn get_device_position(&self, robot_id: i64) -> DomainResult<Option<DevicePosition>>;
    /// Creates the device on first report. A fix without heading keeps the
    /// stored one.
    async fn record_position(&self, robot_id: i64, fix: PositionFix)
        -> DomainResult<DevicePosition>;

    async fn get_map(&self, map_id: i64) -> DomainResult<Option<CampusMap>>;
    async fn list_maps(&self) -> DomainResult<Vec<CampusMap>>;
    async fn insert_map(&self, map: NewCampusMap) -> DomainResult<CampusMap>;
    async fn update_map(&self, map: &CampusMap) -> DomainResult<()>;
    /// Flags `map_id` as primary and clears every other map's flag.
    async fn set_primary_map(&self, map_id: i64) -> DomainResult<()>;
    async fn primary_map(&self) -> DomainResult<Option<CampusMap>>;

    async fn get_route(&self, route_id: i64) -> DomainResult<Option<Route>>;
    async fn routes_between(&self, start: LocationTag, end: LocationTag)
        -> DomainResult<Vec<Route>>;
    async fn insert_route(&self, route: NewRoute) -> DomainResult<Route>;

    async fn get_guide(&self, guide_id: i64) -> DomainResult<Option<Guide>>;
    async fn active_guide_for_robot(&self, robot_id: i64) -> DomainResult<Option<Guide>>;
    /// Fails with `InvalidState` if the robot already has an active guide.
    async fn insert_guide(&self, guide: NewGuide) -> DomainResult<Guide>;
    async fn save_guide(&self, guide: &Guide) -> DomainResult<()>;
    /// Newest first.
    async fn guides_for_robot(&self, robot_id: i64) -> DomainResult<Vec<Guide>>;
    async fn list_guides(&self) -> DomainResult<Vec<Guide>>;
    async fn delete_guide(&self, guide_id: i64) -> DomainResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Proof that the bus accepted a publication.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub delivered_at: DateTime<Utc>,
    /// Broker position of the message when the transport reports one.
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe port over `robots/{id}/{channel}` style topics.
#[async_trait]
pub trait MessageBus: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Resolves once the transport acknowledged the message.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS)
        -> DomainResult<DeliveryReceipt>;

    /// `pattern` may use `+` for one level and `#` for the remaining levels.
    async fn subscribe(&self, pattern: &str) -> DomainResult<mpsc::Receiver<BusMessage>>;
}
