use crate::common::DomainEvent;
use crate::domains::fleet::OperationalState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NavigationEvent {
    GuideStarted {
        guide_id: i64,
        robot_id: i64,
        route_id: i64,
        timestamp: DateTime<Utc>,
    },
    GuideAdvanced {
        guide_id: i64,
        robot_id: i64,
        waypoint_index: usize,
        progress_percent: f64,
        timestamp: DateTime<Utc>,
    },
    GuideCompleted {
        guide_id: i64,
        robot_id: i64,
        timestamp: DateTime<Utc>,
    },
    GuideCancelled {
        guide_id: i64,
        robot_id: i64,
        waypoint_index: usize,
        timestamp: DateTime<Utc>,
    },
    RobotStateChanged {
        robot_id: i64,
        state: OperationalState,
        timestamp: DateTime<Utc>,
    },
    CommandDispatched {
        robot_id: i64,
        topic: String,
        command: String,
        timestamp: DateTime<Utc>,
    },
    PositionUpdated {
        robot_id: i64,
        lat: f64,
        lng: f64,
        heading_degrees: f64,
        timestamp: DateTime<Utc>,
    },
    BatteryUpdated {
        robot_id: i64,
        level: u8,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for NavigationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NavigationEvent::GuideStarted { .. } => "GuideStarted",
            NavigationEvent::GuideAdvanced { .. } => "GuideAdvanced",
            NavigationEvent::GuideCompleted { .. } => "GuideCompleted",
            NavigationEvent::GuideCancelled { .. } => "GuideCancelled",
            NavigationEvent::RobotStateChanged { .. } => "RobotStateChanged",
            NavigationEvent::CommandDispatched { .. } => "CommandDispatched",
            NavigationEvent::PositionUpdated { .. } => "PositionUpdated",
            NavigationEvent::BatteryUpdated { .. } => "BatteryUpdated",
        }
    }

    fn aggregate_id(&self) -> i64 {
        match self {
            NavigationEvent::GuideStarted { robot_id, .. }
            | NavigationEvent::GuideAdvanced { robot_id, .. }
            | NavigationEvent::GuideCompleted { robot_id, .. }
            | NavigationEvent::GuideCancelled { robot_id, .. }
            | NavigationEvent::RobotStateChanged { robot_id, .. }
            | NavigationEvent::CommandDispatched { robot_id, .. }
            | NavigationEvent::PositionUpdated { robot_id, .. }
            | NavigationEvent::BatteryUpdated { robot_id, .. } => *robot_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            NavigationEvent::GuideStarted { timestamp, .. }
            | NavigationEvent::GuideAdvanced { timestamp, .. }
            | NavigationEvent::GuideCompleted { timestamp, .. }
            | NavigationEvent::GuideCancelled { timestamp, .. }
            | NavigationEvent::RobotStateChanged { timestamp, .. }
            | NavigationEvent::CommandDispatched { timestamp, .. }
            | NavigationEvent::PositionUpdated { timestamp, .. }
            | NavigationEvent::BatteryUpdated { timestamp, .. } => *timestamp,
        }
    }
}
