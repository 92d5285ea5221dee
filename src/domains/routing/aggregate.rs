use crate::common::{DomainError, DomainResult};
use crate::domains::geodesy::distance_meters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named campus locations a route can start or end at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationTag {
    #[serde(rename = "BLOQUE_B")]
    BloqueB,
    #[serde(rename = "BLOQUE_C")]
    BloqueC,
    #[serde(rename = "PUERTA_1")]
    Puerta1,
    #[serde(rename = "PUNTO_ESPERA")]
    PuntoEspera,
    #[serde(rename = "SALIDA")]
    Salida,
}

impl LocationTag {
    pub const ALL: [LocationTag; 5] = [
        LocationTag::BloqueB,
        LocationTag::BloqueC,
        LocationTag::Puerta1,
        LocationTag::PuntoEspera,
        LocationTag::Salida,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationTag::BloqueB => "BLOQUE_B",
            LocationTag::BloqueC => "BLOQUE_C",
            LocationTag::Puerta1 => "PUERTA_1",
            LocationTag::PuntoEspera => "PUNTO_ESPERA",
            LocationTag::Salida => "SALIDA",
        }
    }
}

impl fmt::Display for LocationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationTag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        LocationTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("Unknown location: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Euclidean distance between waypoint pixel coordinates.
    Pixel,
    /// Haversine distance in meters.
    Geodesic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(alias = "x_img")]
    pub x: f64,
    #[serde(alias = "y_img")]
    pub y: f64,
    #[serde(alias = "orden")]
    pub sequence: u32,
}

impl Waypoint {
    pub fn new(sequence: u32, lat: f64, lng: f64, x: f64, y: f64) -> Self {
        Self {
            lat,
            lng,
            x,
            y,
            sequence,
        }
    }

    pub fn distance_to(&self, other: &Waypoint, metric: DistanceMetric) -> f64 {
        match metric {
            DistanceMetric::Pixel => (other.x - self.x).hypot(other.y - self.y),
            DistanceMetric::Geodesic => distance_meters(self.lat, self.lng, other.lat, other.lng),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub waypoints: Vec<Waypoint>,
    pub start_tag: LocationTag,
    pub end_tag: LocationTag,
    pub map_id: i64,
    pub created_at: DateTime<Utc>,
}

pub const MIN_WAYPOINTS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoute {
    pub name: String,
    pub waypoints: Vec<Waypoint>,
    pub start_tag: LocationTag,
    pub end_tag: LocationTag,
    pub map_id: i64,
}

impl NewRoute {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("Route name is required"));
        }
        if self.waypoints.len() < MIN_WAYPOINTS {
            return Err(DomainError::validation(format!(
                "A route needs at least {} waypoints, got {}",
                MIN_WAYPOINTS,
                self.waypoints.len()
            )));
        }
        for (i, w) in self.waypoints.iter().enumerate() {
            if ![w.lat, w.lng, w.x, w.y].iter().all(|v| v.is_finite()) {
                return Err(DomainError::validation(format!(
                    "Waypoint {}: coordinates must be finite numbers",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// Builds the route with waypoints ordered by their sequence number.
    pub fn into_route(mut self, id: i64) -> Route {
        self.waypoints.sort_by_key(|w| w.sequence);
        Route {
            id,
            name: self.name,
            waypoints: self.waypoints,
            start_tag: self.start_tag,
            end_tag: self.end_tag,
            map_id: self.map_id,
            created_at: Utc::now(),
        }
    }
}

impl Route {
    pub fn is_valid(&self) -> bool {
        self.waypoints.len() >= MIN_WAYPOINTS
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn last_index(&self) -> usize {
        self.waypoints.len().saturating_sub(1)
    }

    /// Sum of successive segment lengths from `from_index` to the end.
    pub fn length_from(&self, from_index: usize, metric: DistanceMetric) -> f64 {
        self.waypoints
            .iter()
            .skip(from_index)
            .zip(self.waypoints.iter().skip(from_index + 1))
            .map(|(a, b)| a.distance_to(b, metric))
            .sum()
    }

    pub fn total_length(&self, metric: DistanceMetric) -> f64 {
        self.length_from(0, metric)
    }
}
