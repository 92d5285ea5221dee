use crate::common::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A calibration landmark: known both as a GPS fix and as a pixel on the map
/// image. The ordered list of these also forms the map's boundary polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub lat: f64,
    pub lng: f64,
    pub x_img: f64,
    pub y_img: f64,
    #[serde(default, alias = "orden")]
    pub sequence: Option<u32>,
}

impl ReferencePoint {
    pub fn new(lat: f64, lng: f64, x_img: f64, y_img: f64) -> Self {
        Self {
            lat,
            lng,
            x_img,
            y_img,
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    fn validate(&self, position: usize) -> DomainResult<()> {
        let values = [self.lat, self.lng, self.x_img, self.y_img];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DomainError::validation(format!(
                "Reference point {}: coordinates must be finite numbers",
                position + 1
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(DomainError::validation(format!(
                "Reference point {}: latitude must be between -90 and 90",
                position + 1
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(DomainError::validation(format!(
                "Reference point {}: longitude must be between -180 and 180",
                position + 1
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampusMap {
    pub id: i64,
    pub name: String,
    pub image_url: String,
    pub reference_points: Vec<ReferencePoint>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a map; the repository assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampusMap {
    pub name: String,
    pub image_url: String,
    pub reference_points: Vec<ReferencePoint>,
}

pub const MIN_REFERENCE_POINTS: usize = 3;

impl NewCampusMap {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("Map name is required"));
        }
        if self.image_url.trim().is_empty() {
            return Err(DomainError::validation("Map image reference is required"));
        }
        validate_reference_points(&self.reference_points)
    }

    pub fn into_map(self, id: i64, is_primary: bool) -> CampusMap {
        let now = Utc::now();
        CampusMap {
            id,
            name: self.name,
            image_url: self.image_url,
            reference_points: self.reference_points,
            is_primary,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn validate_reference_points(points: &[ReferencePoint]) -> DomainResult<()> {
    if points.len() < MIN_REFERENCE_POINTS {
        return Err(DomainError::validation(format!(
            "A map needs at least {} reference points to form a polygon, got {}",
            MIN_REFERENCE_POINTS,
            points.len()
        )));
    }
    points
        .iter()
        .enumerate()
        .try_for_each(|(i, p)| p.validate(i))
}

impl CampusMap {
    pub fn pixel_vertices(&self) -> Vec<(f64, f64)> {
        self.reference_points
            .iter()
            .map(|p| (p.x_img, p.y_img))
            .collect()
    }

    /// Geo vertices as (lng, lat) so that x runs east like the pixel axis.
    pub fn geo_vertices(&self) -> Vec<(f64, f64)> {
        self.reference_points.iter().map(|p| (p.lng, p.lat)).collect()
    }

    pub fn apply_update(&mut self, update: NewCampusMap) -> DomainResult<()> {
        update.validate()?;
        self.name = update.name;
        self.image_url = update.image_url;
        self.reference_points = update.reference_points;
        self.updated_at = Utc::now();
        Ok(())
    }
}
