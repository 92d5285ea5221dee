use crate::common::{DomainError, DomainResult};
use crate::domains::fleet::RobotUnit;
use crate::domains::routing::{DistanceMetric, Route, Waypoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Walking pace assumed for arrival estimates.
pub const GUIDE_SPEED_KMH: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuideState {
    Active,
    Completed,
    Cancelled,
}

impl GuideState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuideState::Active => "ACTIVE",
            GuideState::Completed => "COMPLETED",
            GuideState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GuideState::Active)
    }
}

impl fmt::Display for GuideState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GuideState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(GuideState::Active),
            "COMPLETED" => Ok(GuideState::Completed),
            "CANCELLED" => Ok(GuideState::Cancelled),
            other => Err(DomainError::validation(format!("Unknown guide state: {}", other))),
        }
    }
}

/// A navigation session binding one robot to one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub id: i64,
    pub route_id: i64,
    pub robot_id: i64,
    pub current_waypoint_index: usize,
    pub state: GuideState,
    pub waypoint_count: usize,
    pub started_at: DateTime<Utc>,
    pub last_advanced_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A guide before the repository has assigned its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGuide {
    pub route_id: i64,
    pub robot_id: i64,
    pub waypoint_count: usize,
}

impl NewGuide {
    pub fn for_route(route: &Route, robot_id: i64) -> DomainResult<Self> {
        if !route.is_valid() {
            return Err(DomainError::validation(format!(
                "Route {} has fewer than two waypoints",
                route.id
            )));
        }
        Ok(Self {
            route_id: route.id,
            robot_id,
            waypoint_count: route.waypoints.len(),
        })
    }

    pub fn into_guide(self, id: i64) -> Guide {
        Guide {
            id,
            route_id: self.route_id,
            robot_id: self.robot_id,
            current_waypoint_index: 0,
            state: GuideState::Active,
            waypoint_count: self.waypoint_count,
            started_at: Utc::now(),
            last_advanced_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }
}

impl Guide {
    pub fn is_active(&self) -> bool {
        self.state == GuideState::Active
    }

    pub fn last_index(&self) -> usize {
        self.waypoint_count.saturating_sub(1)
    }

    fn ensure_active(&self, operation: &str) -> DomainResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DomainError::invalid_state(format!(
                "Cannot {} guide {} in state {}",
                operation, self.id, self.state
            )))
        }
    }

    /// Moves to the next waypoint. Returns `false`, leaving the index alone,
    /// when already at the last one.
    pub fn advance(&mut self) -> DomainResult<bool> {
        self.ensure_active("advance")?;
        if self.current_waypoint_index >= self.last_index() {
            return Ok(false);
        }
        self.current_waypoint_index += 1;
        self.last_advanced_at = Some(Utc::now());
        Ok(true)
    }

    pub fn progress_percent(&self) -> f64 {
        if self.waypoint_count <= 1 {
            return 0.0;
        }
        self.current_waypoint_index as f64 / self.last_index() as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.current_waypoint_index >= self.last_index()
    }

    pub fn remaining_distance(&self, route: &Route, metric: DistanceMetric) -> f64 {
        route.length_from(self.current_waypoint_index, metric)
    }

    /// Manual correction of the current waypoint.
    pub fn go_to_waypoint(&mut self, index: usize) -> DomainResult<()> {
        self.ensure_active("reposition")?;
        if index >= self.waypoint_count {
            return Err(DomainError::validation(format!(
                "Waypoint index {} out of range, route has {} waypoints",
                index, self.waypoint_count
            )));
        }
        self.current_waypoint_index = index;
        self.last_advanced_at = Some(Utc::now());
        Ok(())
    }

    /// Completes the guide and frees its robot.
    pub fn finalize(&mut self, robot: &mut RobotUnit) -> DomainResult<()> {
        self.ensure_owner(robot)?;
        self.ensure_active("finalize")?;
        self.current_waypoint_index = self.last_index();
        self.state = GuideState::Completed;
        self.completed_at = Some(Utc::now());
        robot.release();
        Ok(())
    }

    /// Cancels the guide wherever it is and frees its robot.
    pub fn cancel(&mut self, robot: &mut RobotUnit) -> DomainResult<()> {
        self.ensure_owner(robot)?;
        self.ensure_active("cancel")?;
        self.state = GuideState::Cancelled;
        self.cancelled_at = Some(Utc::now());
        robot.release();
        Ok(())
    }

    fn ensure_owner(&self, robot: &RobotUnit) -> DomainResult<()> {
        if robot.id != self.robot_id {
            return Err(DomainError::validation(format!(
                "Guide {} belongs to robot {}, not {}",
                self.id, self.robot_id, robot.id
            )));
        }
        Ok(())
    }

    pub fn duration_minutes(&self) -> Option<f64> {
        let end = self.completed_at.or(self.cancelled_at)?;
        Some((end - self.started_at).num_milliseconds() as f64 / 60_000.0)
    }
}

/// Snapshot of where a guide stands on its route. Distances are in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideProgress {
    pub guide_id: i64,
    pub robot_id: i64,
    pub route_id: i64,
    pub state: GuideState,
    pub current_waypoint_index: usize,
    pub waypoint_count: usize,
    pub progress_percent: f64,
    pub complete: bool,
    pub distance_traveled_m: f64,
    pub total_distance_m: f64,
    pub remaining_distance_m: f64,
    pub distance_to_next_m: f64,
    pub next_waypoint: Option<Waypoint>,
    pub estimated_minutes: u64,
}

impl GuideProgress {
    pub fn compute(guide: &Guide, route: &Route) -> Self {
        let metric = DistanceMetric::Geodesic;
        let total = route.total_length(metric);
        let remaining = guide.remaining_distance(route, metric);
        let complete = guide.is_complete();

        let current = route.waypoint(guide.current_waypoint_index);
        let next = if complete {
            None
        } else {
            route.waypoint(guide.current_waypoint_index + 1).cloned()
        };
        let distance_to_next = match (current, next.as_ref()) {
            (Some(a), Some(b)) => a.distance_to(b, metric),
            _ => 0.0,
        };

        Self {
            guide_id: guide.id,
            robot_id: guide.robot_id,
            route_id: guide.route_id,
            state: guide.state,
            current_waypoint_index: guide.current_waypoint_index,
            waypoint_count: guide.waypoint_count,
            progress_percent: guide.progress_percent(),
            complete,
            distance_traveled_m: (total - remaining).max(0.0),
            total_distance_m: total,
            remaining_distance_m: remaining,
            distance_to_next_m: distance_to_next,
            next_waypoint: next,
            estimated_minutes: estimated_minutes(remaining),
        }
    }
}

/// Minutes to cover `meters` at [`GUIDE_SPEED_KMH`], rounded.
pub fn estimated_minutes(meters: f64) -> u64 {
    let hours = meters / 1000.0 / GUIDE_SPEED_KMH;
    (hours * 60.0).round().max(0.0) as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub success_rate_percent: f64,
    pub average_completion_minutes: u64,
    pub generated_at: DateTime<Utc>,
}

impl GuideStats {
    pub fn from_guides(guides: &[Guide]) -> Self {
        let count = |state: GuideState| guides.iter().filter(|g| g.state == state).count();
        let total = guides.len();
        let completed = count(GuideState::Completed);

        let durations: Vec<f64> = guides
            .iter()
            .filter(|g| g.state == GuideState::Completed)
            .filter_map(Guide::duration_minutes)
            .collect();
        let average = if durations.is_empty() {
            0
        } else {
            (durations.iter().sum::<f64>() / durations.len() as f64).round() as u64
        };

        Self {
            total,
            active: count(GuideState::Active),
            completed,
            cancelled: count(GuideState::Cancelled),
            success_rate_percent: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            average_completion_minutes: average,
            generated_at: Utc::now(),
        }
    }
}
