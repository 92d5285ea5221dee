use super::aggregate::CampusMap;

/// Even-odd ray casting. Fewer than three vertices never contain anything.
pub fn point_in_polygon(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Shoelace formula, absolute value.
pub fn shoelace_area(vertices: &[(f64, f64)]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }

    let twice_area: f64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|((x1, y1), (x2, y2))| x1 * y2 - x2 * y1)
        .sum();

    twice_area.abs() / 2.0
}

fn vertex_average(vertices: &[(f64, f64)]) -> Option<(f64, f64)> {
    if vertices.is_empty() {
        return None;
    }
    let n = vertices.len() as f64;
    let (sx, sy) = vertices
        .iter()
        .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    Some((sx / n, sy / n))
}

pub fn contains_pixel(map: &CampusMap, x: f64, y: f64) -> bool {
    point_in_polygon(&map.pixel_vertices(), x, y)
}

pub fn contains_geo(map: &CampusMap, lat: f64, lng: f64) -> bool {
    point_in_polygon(&map.geo_vertices(), lng, lat)
}

pub fn polygon_area_pixels(map: &CampusMap) -> f64 {
    shoelace_area(&map.pixel_vertices())
}

/// Average of the reference points in pixel space, `(x, y)`.
pub fn center_pixel(map: &CampusMap) -> Option<(f64, f64)> {
    vertex_average(&map.pixel_vertices())
}

/// Average of the reference points, `(lat, lng)`.
pub fn center_geo(map: &CampusMap) -> Option<(f64, f64)> {
    vertex_average(&map.geo_vertices()).map(|(lng, lat)| (lat, lng))
}
