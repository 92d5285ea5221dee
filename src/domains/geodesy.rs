//! Great-circle math over WGS84 lat/lng and the four-way turn decision the
//! orchestrator issues as robot commands.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
pub const DEFAULT_TURN_THRESHOLD_DEGREES: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Forward,
    Backward,
    Left,
    Right,
}

impl TurnDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnDirection::Forward => "forward",
            TurnDirection::Backward => "backward",
            TurnDirection::Left => "left",
            TurnDirection::Right => "right",
        }
    }
}

/// Haversine distance in meters.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Forward azimuth from the first point to the second, in [0, 360) with 0 = north.
pub fn bearing_degrees(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Wraps any angle into [0, 360).
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

const COMPASS_16: [(&str, f64); 16] = [
    ("N", 0.0),
    ("NNE", 22.5),
    ("NE", 45.0),
    ("ENE", 67.5),
    ("E", 90.0),
    ("ESE", 112.5),
    ("SE", 135.0),
    ("SSE", 157.5),
    ("S", 180.0),
    ("SSW", 202.5),
    ("SW", 225.0),
    ("WSW", 247.5),
    ("W", 270.0),
    ("WNW", 292.5),
    ("NW", 315.0),
    ("NNW", 337.5),
];

/// Maps a 16-point compass label to degrees. Unknown labels map to north (0).
pub fn cardinal_to_angle(label: &str) -> f64 {
    let key = label.trim().to_ascii_uppercase();
    COMPASS_16
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, angle)| *angle)
        .unwrap_or(0.0)
}

/// 8-point compass label for a heading.
pub fn heading_to_cardinal(heading: f64) -> &'static str {
    const LABELS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = (normalize_degrees(heading) / 45.0).round() as usize % 8;
    LABELS[index]
}

/// Signed difference `target - current` normalized to (-180, 180].
pub fn signed_heading_difference(current: f64, target: f64) -> f64 {
    let diff = (target - current + 180.0).rem_euclid(360.0) - 180.0;
    if diff <= -180.0 {
        diff + 360.0
    } else {
        diff
    }
}

pub fn decide_turn(current_heading: f64, target_bearing: f64, threshold_degrees: f64) -> TurnDirection {
    let diff = signed_heading_difference(current_heading, target_bearing);

    if diff.abs() <= threshold_degrees {
        TurnDirection::Forward
    } else if diff.abs() >= 180.0 - threshold_degrees {
        TurnDirection::Backward
    } else if diff > 0.0 {
        TurnDirection::Left
    } else {
        TurnDirection::Right
    }
}
