use super::events::NavigationEvent;
use crate::common::DomainEvent;
use crate::domains::fleet::OperationalState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Live overview of one robot, folded from navigation events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotOverview {
    pub robot_id: i64,
    pub state: Option<OperationalState>,
    pub battery_level: Option<u8>,
    pub active_guide_id: Option<i64>,
    pub waypoint_index: usize,
    pub progress_percent: f64,
    pub last_position: Option<(f64, f64)>,
    pub heading_degrees: Option<f64>,
    pub commands_dispatched: u64,
    pub last_command: Option<String>,
    pub guides_completed: u64,
    pub guides_cancelled: u64,
    pub last_activity: DateTime<Utc>,
}

impl RobotOverview {
    pub fn new(robot_id: i64, seen_at: DateTime<Utc>) -> Self {
        Self {
            robot_id,
            state: None,
            battery_level: None,
            active_guide_id: None,
            waypoint_index: 0,
            progress_percent: 0.0,
            last_position: None,
            heading_degrees: None,
            commands_dispatched: 0,
            last_command: None,
            guides_completed: 0,
            guides_cancelled: 0,
            last_activity: seen_at,
        }
    }

    pub fn apply_event(&mut self, event: &NavigationEvent) {
        match event {
            NavigationEvent::GuideStarted { guide_id, .. } => {
                self.active_guide_id = Some(*guide_id);
                self.waypoint_index = 0;
                self.progress_percent = 0.0;
            }
            NavigationEvent::GuideAdvanced {
                waypoint_index,
                progress_percent,
                ..
            } => {
                self.waypoint_index = *waypoint_index;
                self.progress_percent = *progress_percent;
            }
            NavigationEvent::GuideCompleted { .. } => {
                self.active_guide_id = None;
                self.progress_percent = 100.0;
                self.guides_completed += 1;
            }
            NavigationEvent::GuideCancelled { .. } => {
                self.active_guide_id = None;
                self.guides_cancelled += 1;
            }
            NavigationEvent::RobotStateChanged { state, .. } => {
                self.state = Some(*state);
            }
            NavigationEvent::CommandDispatched { command, .. } => {
                self.commands_dispatched += 1;
                self.last_command = Some(command.clone());
            }
            NavigationEvent::PositionUpdated {
                lat,
                lng,
                heading_degrees,
                ..
            } => {
                self.last_position = Some((*lat, *lng));
                self.heading_degrees = Some(*heading_degrees);
            }
            NavigationEvent::BatteryUpdated { level, .. } => {
                self.battery_level = Some(*level);
            }
        }
        self.last_activity = event.occurred_at();
    }
}

#[derive(Debug, Default)]
pub struct FleetProjectionStore {
    pub robots: HashMap<i64, RobotOverview>,
}

impl FleetProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_event(&mut self, event: &NavigationEvent) {
        let robot_id = event.aggregate_id();
        self.robots
            .entry(robot_id)
            .or_insert_with(|| RobotOverview::new(robot_id, event.occurred_at()))
            .apply_event(event);
    }

    pub fn active_guides(&self) -> usize {
        self.robots
            .values()
            .filter(|r| r.active_guide_id.is_some())
            .count()
    }
}
