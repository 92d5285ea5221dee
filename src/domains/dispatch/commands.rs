use crate::domains::routing::{LocationTag, Route, Waypoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

pub const DEFAULT_MOVE_SPEED: u8 = 50;
pub const DEFAULT_TURN_ANGLE: f64 = 90.0;
pub const DEFAULT_TURN_SPEED: u8 = 30;
pub const MAX_SPEED: f64 = 100.0;

/// Last level of the `robots/{id}/{channel}` command topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Movement,
    Navigation,
    Route,
    Config,
    Control,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Movement => "movement",
            Channel::Navigation => "navigation",
            Channel::Route => "route",
            Channel::Config => "config",
            Channel::Control => "control",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveParams {
    pub speed: u8,
    #[serde(rename = "distance")]
    pub distance_m: Option<f64>,
    #[serde(rename = "duration")]
    pub duration_ms: Option<u64>,
}

impl Default for MoveParams {
    fn default() -> Self {
        Self {
            speed: DEFAULT_MOVE_SPEED,
            distance_m: None,
            duration_ms: None,
        }
    }
}

impl MoveParams {
    pub fn with_speed(speed: u8) -> Self {
        Self {
            speed: clamp_speed(speed as f64),
            ..Self::default()
        }
    }

    pub fn distance(mut self, meters: f64) -> Self {
        self.distance_m = Some(meters);
        self
    }

    pub fn duration_ms(mut self, millis: u64) -> Self {
        self.duration_ms = Some(millis);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum RobotCommand {
    MoveForward(MoveParams),
    MoveBackward(MoveParams),
    TurnLeft { angle: f64, speed: u8 },
    TurnRight { angle: f64, speed: u8 },
    Stop,
    EmergencyStop,
    SetSpeed { speed: u8 },
    Wait { duration_ms: u64 },
    FollowRoute {
        route_id: i64,
        route_name: String,
        waypoints: Vec<Waypoint>,
        start: LocationTag,
        end: LocationTag,
    },
    NavigateTo { location: LocationTag },
    GoToCoordinates { lat: f64, lng: f64 },
}

/// Clamps to [0, 100]. NaN becomes 0.
pub fn clamp_speed(speed: f64) -> u8 {
    if speed.is_nan() {
        return 0;
    }
    speed.clamp(0.0, MAX_SPEED).round() as u8
}

impl RobotCommand {
    pub fn turn_left(angle: f64) -> Self {
        RobotCommand::TurnLeft {
            angle,
            speed: DEFAULT_TURN_SPEED,
        }
    }

    pub fn turn_right(angle: f64) -> Self {
        RobotCommand::TurnRight {
            angle,
            speed: DEFAULT_TURN_SPEED,
        }
    }

    pub fn set_speed(speed: f64) -> Self {
        RobotCommand::SetSpeed {
            speed: clamp_speed(speed),
        }
    }

    pub fn follow_route(route: &Route) -> Self {
        RobotCommand::FollowRoute {
            route_id: route.id,
            route_name: route.name.clone(),
            waypoints: route.waypoints.clone(),
            start: route.start_tag,
            end: route.end_tag,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            RobotCommand::MoveForward(_)
            | RobotCommand::MoveBackward(_)
            | RobotCommand::TurnLeft { .. }
            | RobotCommand::TurnRight { .. }
            | RobotCommand::Stop
            | RobotCommand::EmergencyStop => Channel::Movement,
            RobotCommand::SetSpeed { .. } => Channel::Config,
            RobotCommand::Wait { .. } => Channel::Control,
            RobotCommand::FollowRoute { .. } => Channel::Route,
            RobotCommand::NavigateTo { .. } | RobotCommand::GoToCoordinates { .. } => {
                Channel::Navigation
            }
        }
    }

    /// Whether a confirmed dispatch marks the robot BUSY. Emergency stops
    /// never touch robot state.
    pub fn is_movement_class(&self) -> bool {
        !matches!(self, RobotCommand::EmergencyStop)
            && matches!(
                self.channel(),
                Channel::Movement | Channel::Navigation | Channel::Route
            )
    }

    pub fn message_type(&self) -> &'static str {
        match self.channel() {
            Channel::Movement => "MOVEMENT_COMMAND",
            Channel::Navigation => "NAVIGATION_COMMAND",
            Channel::Route => "ROUTE_COMMAND",
            Channel::Config => "CONFIG_COMMAND",
            Channel::Control => "CONTROL_COMMAND",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RobotCommand::MoveForward(_) => "MOVE_FORWARD",
            RobotCommand::MoveBackward(_) => "MOVE_BACKWARD",
            RobotCommand::TurnLeft { .. } => "TURN_LEFT",
            RobotCommand::TurnRight { .. } => "TURN_RIGHT",
            RobotCommand::Stop => "STOP",
            RobotCommand::EmergencyStop => "EMERGENCY_STOP",
            RobotCommand::SetSpeed { .. } => "SET_SPEED",
            RobotCommand::Wait { .. } => "WAIT",
            RobotCommand::FollowRoute { .. } => "FOLLOW_ROUTE",
            RobotCommand::NavigateTo { .. } => "MOVE_TO_LOCATION",
            RobotCommand::GoToCoordinates { .. } => "GO_TO_COORDINATES",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            RobotCommand::MoveForward(p) | RobotCommand::MoveBackward(p) => json!({
                "speed": p.speed,
                "distance": p.distance_m,
                "duration": p.duration_ms,
            }),
            RobotCommand::TurnLeft { angle, speed } | RobotCommand::TurnRight { angle, speed } => {
                json!({ "angle": angle, "speed": speed })
            }
            RobotCommand::Stop => json!({ "emergency": false }),
            RobotCommand::EmergencyStop => json!({ "emergency": true }),
            RobotCommand::SetSpeed { speed } => json!({ "speed": speed }),
            RobotCommand::Wait { duration_ms } => json!({ "duration": duration_ms }),
            RobotCommand::FollowRoute {
                route_id,
                route_name,
                waypoints,
                start,
                end,
            } => json!({
                "routeId": route_id,
                "routeName": route_name,
                "points": waypoints,
                "start": start,
                "end": end,
            }),
            RobotCommand::NavigateTo { location } => json!({ "location": location }),
            RobotCommand::GoToCoordinates { lat, lng } => json!({ "lat": lat, "lng": lng }),
        }
    }

    pub fn to_message(&self) -> CommandMessage {
        CommandMessage {
            kind: self.message_type().to_string(),
            command: self.name().to_string(),
            params: self.params(),
            timestamp: Utc::now(),
        }
    }
}

/// Wire payload published on a command topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub command: String,
    pub params: Value,
    pub timestamp: DateTime<Utc>,
}
