use super::aggregate::{CampusMap, ReferencePoint};
use crate::common::{DomainError, DomainResult};
use crate::config::MappingConfig;
use crate::domains::geodesy::distance_meters;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Relative slack for treating a candidate as tied with the k-th nearest one.
const TIE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ConversionMethod {
    /// The map has a single reference point; its value is returned unchanged.
    SingleReference,
    Interpolated { samples: usize },
    /// No reference point inside the pixel window, nearest one used directly.
    NearestPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelConversion {
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub method: ConversionMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoConversion {
    pub lat: f64,
    pub lng: f64,
    #[serde(flatten)]
    pub method: ConversionMethod,
}

/// Converts between a map's geographic and pixel spaces using its reference
/// points as calibration samples.
///
/// The two directions select samples differently: geo→pixel takes the k
/// nearest points by geodesic distance, pixel→geo takes every point inside a
/// square pixel window and falls back to the single nearest point.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateMapper {
    params: MappingConfig,
}

impl CoordinateMapper {
    pub fn new(params: MappingConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MappingConfig {
        &self.params
    }

    pub fn geo_to_pixel(&self, map: &CampusMap, lat: f64, lng: f64) -> DomainResult<PixelConversion> {
        ensure_finite(&[lat, lng])?;
        let points = non_empty_points(map)?;

        if let [only] = points {
            return Ok(PixelConversion {
                x: only.x_img,
                y: only.y_img,
                method: ConversionMethod::SingleReference,
            });
        }

        let mut ranked: Vec<(OrderedFloat<f64>, &ReferencePoint)> = points
            .iter()
            .map(|p| (OrderedFloat(distance_meters(lat, lng, p.lat, p.lng)), p))
            .collect();
        ranked.sort_by_key(|(d, _)| *d);

        let k = self.params.k_nearest.clamp(1, ranked.len());
        let cutoff = ranked[k - 1].0.into_inner();
        let limit = cutoff + cutoff.abs() * TIE_TOLERANCE;

        let samples: Vec<(f64, f64, f64)> = ranked
            .iter()
            .take_while(|(d, _)| d.into_inner() <= limit)
            .map(|(d, p)| (d.into_inner(), p.x_img, p.y_img))
            .collect();

        let (x, y) = inverse_distance_weighting(&samples, self.params.epsilon);
        Ok(PixelConversion {
            x,
            y,
            method: ConversionMethod::Interpolated {
                samples: samples.len(),
            },
        })
    }

    pub fn pixel_to_geo(&self, map: &CampusMap, x: f64, y: f64) -> DomainResult<GeoConversion> {
        ensure_finite(&[x, y])?;
        let points = non_empty_points(map)?;
        let tolerance = self.params.pixel_tolerance;

        let samples: Vec<(f64, f64, f64)> = points
            .iter()
            .filter(|p| (p.x_img - x).abs() <= tolerance && (p.y_img - y).abs() <= tolerance)
            .map(|p| (pixel_distance(p, x, y), p.lat, p.lng))
            .collect();

        if samples.is_empty() {
            let nearest = points
                .iter()
                .min_by_key(|p| OrderedFloat(pixel_distance(p, x, y)))
                .ok_or_else(|| DomainError::validation("Map has no reference points"))?;
            return Ok(GeoConversion {
                lat: nearest.lat,
                lng: nearest.lng,
                method: ConversionMethod::NearestPoint,
            });
        }

        let (lat, lng) = inverse_distance_weighting(&samples, self.params.epsilon);
        Ok(GeoConversion {
            lat,
            lng,
            method: ConversionMethod::Interpolated {
                samples: samples.len(),
            },
        })
    }
}

pub fn geo_to_pixel(map: &CampusMap, lat: f64, lng: f64) -> DomainResult<PixelConversion> {
    CoordinateMapper::default().geo_to_pixel(map, lat, lng)
}

pub fn pixel_to_geo(map: &CampusMap, x: f64, y: f64) -> DomainResult<GeoConversion> {
    CoordinateMapper::default().pixel_to_geo(map, x, y)
}

/// Samples are `(distance, a, b)`; returns the weighted `(a, b)`.
fn inverse_distance_weighting(samples: &[(f64, f64, f64)], epsilon: f64) -> (f64, f64) {
    let (mut sum_a, mut sum_b, mut total) = (0.0, 0.0, 0.0);
    for (distance, a, b) in samples {
        let weight = 1.0 / (distance + epsilon);
        sum_a += weight * a;
        sum_b += weight * b;
        total += weight;
    }
    (sum_a / total, sum_b / total)
}

fn pixel_distance(p: &ReferencePoint, x: f64, y: f64) -> f64 {
    (p.x_img - x).hypot(p.y_img - y)
}

fn non_empty_points(map: &CampusMap) -> DomainResult<&[ReferencePoint]> {
    if map.reference_points.is_empty() {
        return Err(DomainError::validation(format!(
            "Map {} has no reference points",
            map.id
        )));
    }
    Ok(&map.reference_points)
}

fn ensure_finite(values: &[f64]) -> DomainResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(DomainError::validation("Coordinates must be finite numbers"))
    }
}
