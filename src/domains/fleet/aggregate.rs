use crate::common::{DomainError, DomainResult};
use crate::domains::geodesy::{heading_to_cardinal, normalize_degrees};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalState {
    Free,
    Busy,
    Maintenance,
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalState::Free => "FREE",
            OperationalState::Busy => "BUSY",
            OperationalState::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationalState {
    type Err = DomainError;

    /// Accepts the labels robots report in their status telemetry as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" | "LIBRE" => Ok(OperationalState::Free),
            "BUSY" | "OCUPADO" => Ok(OperationalState::Busy),
            "MAINTENANCE" | "MANTENIMIENTO" => Ok(OperationalState::Maintenance),
            other => Err(DomainError::validation(format!(
                "Unknown operational state: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotUnit {
    pub id: i64,
    pub operational_state: OperationalState,
    pub battery_level: u8,
    pub active_route_id: Option<i64>,
    pub device_id: Option<i64>,
    /// Voice assistant this robot serves guide requests for.
    pub assistant_id: Option<i64>,
}

impl RobotUnit {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            operational_state: OperationalState::Free,
            battery_level: 100,
            active_route_id: None,
            device_id: None,
            assistant_id: None,
        }
    }

    pub fn with_assistant(mut self, assistant_id: i64) -> Self {
        self.assistant_id = Some(assistant_id);
        self
    }

    pub fn with_battery(mut self, level: u8) -> Self {
        self.battery_level = level.min(100);
        self
    }

    pub fn is_in_maintenance(&self) -> bool {
        self.operational_state == OperationalState::Maintenance
    }

    pub fn can_accept_guide(&self, min_battery_level: u8) -> bool {
        self.operational_state == OperationalState::Free && self.battery_level >= min_battery_level
    }

    pub fn mark_busy(&mut self) {
        self.operational_state = OperationalState::Busy;
    }

    pub fn assign_route(&mut self, route_id: i64) {
        self.operational_state = OperationalState::Busy;
        self.active_route_id = Some(route_id);
    }

    /// Drops the route binding. A robot in maintenance stays there.
    pub fn release(&mut self) {
        if !self.is_in_maintenance() {
            self.operational_state = OperationalState::Free;
        }
        self.active_route_id = None;
    }

    pub fn set_battery_level(&mut self, level: f64) -> DomainResult<()> {
        if !level.is_finite() {
            return Err(DomainError::validation("Battery level must be a number"));
        }
        self.battery_level = level.round().clamp(0.0, 100.0) as u8;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePosition {
    pub id: i64,
    pub robot_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub heading_degrees: f64,
    pub updated_at: DateTime<Utc>,
}

impl DevicePosition {
    pub fn cardinal(&self) -> &'static str {
        heading_to_cardinal(self.heading_degrees)
    }
}

/// One validated location report from a robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub lat: f64,
    pub lng: f64,
    pub heading_degrees: Option<f64>,
}

impl PositionFix {
    pub fn new(lat: f64, lng: f64, heading_degrees: Option<f64>) -> DomainResult<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(DomainError::validation(
                "Latitude and longitude must be valid numbers",
            ));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DomainError::validation("Latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(DomainError::validation("Longitude must be between -180 and 180"));
        }
        let heading_degrees = match heading_degrees {
            Some(h) if !h.is_finite() => {
                return Err(DomainError::validation("Heading must be a valid number"))
            }
            Some(h) => Some(normalize_degrees(h)),
            None => None,
        };
        Ok(Self {
            lat,
            lng,
            heading_degrees,
        })
    }
}
