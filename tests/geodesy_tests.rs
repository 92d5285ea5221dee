use campus_guide::domains::geodesy::*;

const CAMPUS_LAT: f64 = 4.6031;
const CAMPUS_LNG: f64 = -74.0658;

#[test]
fn test_distance_of_one_degree_on_equator() {
    let d = distance_meters(0.0, 0.0, 0.0, 1.0);
    assert!((d - 111_194.93).abs() < 1.0, "got {}", d);
}

#[test]
fn test_distance_is_symmetric_and_zero_on_same_point() {
    let a = (CAMPUS_LAT, CAMPUS_LNG);
    let b = (CAMPUS_LAT + 0.001, CAMPUS_LNG - 0.002);
    assert_eq!(distance_meters(a.0, a.1, a.0, a.1), 0.0);
    let ab = distance_meters(a.0, a.1, b.0, b.1);
    let ba = distance_meters(b.0, b.1, a.0, a.1);
    assert!((ab - ba).abs() < 1e-6);
    assert!(ab > 200.0 && ab < 300.0, "got {}", ab);
}

#[test]
fn test_bearing_cardinal_directions() {
    assert!((bearing_degrees(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
    assert!((bearing_degrees(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
    assert!((bearing_degrees(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
    assert!((bearing_degrees(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
}

#[test]
fn test_bearing_always_in_range() {
    let targets = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0), (0.5, -0.0001)];
    for (lat, lng) in targets {
        let b = bearing_degrees(CAMPUS_LAT, CAMPUS_LNG, CAMPUS_LAT + lat, CAMPUS_LNG + lng);
        assert!((0.0..360.0).contains(&b), "bearing {} out of range", b);
    }
}

#[test]
fn test_same_heading_goes_forward() {
    for h in [0.0, 45.0, 179.9, 180.0, 270.0, 359.0] {
        assert_eq!(decide_turn(h, h, DEFAULT_TURN_THRESHOLD_DEGREES), TurnDirection::Forward);
    }
}

#[test]
fn test_opposite_heading_goes_backward() {
    for h in [0.0, 45.0, 90.0, 200.0, 359.0] {
        assert_eq!(
            decide_turn(h, h + 180.0, DEFAULT_TURN_THRESHOLD_DEGREES),
            TurnDirection::Backward
        );
    }
}

#[test]
fn test_turn_sides_and_thresholds() {
    assert_eq!(decide_turn(0.0, 90.0, 30.0), TurnDirection::Left);
    assert_eq!(decide_turn(0.0, 270.0, 30.0), TurnDirection::Right);
    assert_eq!(decide_turn(350.0, 15.0, 30.0), TurnDirection::Forward);
    assert_eq!(decide_turn(0.0, 30.0, 30.0), TurnDirection::Forward);
    assert_eq!(decide_turn(0.0, 31.0, 30.0), TurnDirection::Left);
    assert_eq!(decide_turn(0.0, 150.0, 30.0), TurnDirection::Backward);
    assert_eq!(decide_turn(0.0, 149.0, 30.0), TurnDirection::Left);
}

#[test]
fn test_wraparound_difference() {
    assert!((signed_heading_difference(350.0, 10.0) - 20.0).abs() < 1e-9);
    assert!((signed_heading_difference(10.0, 350.0) + 20.0).abs() < 1e-9);
    assert_eq!(signed_heading_difference(0.0, 180.0), 180.0);
}

#[test]
fn test_cardinal_labels() {
    assert_eq!(cardinal_to_angle("N"), 0.0);
    assert_eq!(cardinal_to_angle("ne"), 45.0);
    assert_eq!(cardinal_to_angle(" WSW "), 247.5);
    assert_eq!(cardinal_to_angle("up"), 0.0);
    assert_eq!(heading_to_cardinal(91.0), "E");
    assert_eq!(heading_to_cardinal(-45.0), "NW");
}

#[test]
fn test_reverse_bearing_is_opposite() {
    let pairs = [
        ((CAMPUS_LAT, CAMPUS_LNG), (CAMPUS_LAT + 0.01, CAMPUS_LNG + 0.01)),
        ((CAMPUS_LAT, CAMPUS_LNG), (CAMPUS_LAT - 0.002, CAMPUS_LNG + 0.0005)),
        ((CAMPUS_LAT, CAMPUS_LNG), (CAMPUS_LAT, CAMPUS_LNG - 0.003)),
    ];
    for ((lat1, lng1), (lat2, lng2)) in pairs {
        let forward = bearing_degrees(lat1, lng1, lat2, lng2);
        let back = bearing_degrees(lat2, lng2, lat1, lng1);
        let gap = (back - forward).rem_euclid(360.0);
        assert!((gap - 180.0).abs() < 0.01, "{} -> {}: {}", forward, back, gap);
    }
}
