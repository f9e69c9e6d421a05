//! Geodesic measurements for shapes drawn on the map.
//!
//! Lengths use the haversine formula and areas the spherical-excess
//! approximation, both on the mean Earth sphere.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::map::LatLng;

pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Polyline { points: Vec<LatLng> },
    Polygon { points: Vec<LatLng> },
    Rectangle { south_west: LatLng, north_east: LatLng },
    Circle { center: LatLng, radius_m: f64 },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_m: Option<f64>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeasureError {
    TooFewPoints { needed: usize, got: usize },
    InvalidRadius(f64),
    NonFiniteCoordinate,
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "shape needs at least {needed} points, got {got}")
            }
            Self::InvalidRadius(radius) => write!(f, "circle radius must be positive, got {radius}"),
            Self::NonFiniteCoordinate => f.write_str("shape contains a non-finite coordinate"),
        }
    }
}

impl std::error::Error for MeasureError {}

pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn path_length_m(points: &[LatLng]) -> f64 {
    points.windows(2).map(|pair| haversine_m(pair[0], pair[1])).sum()
}

/// Area of a closed ring; the closing edge is implied.
pub fn ring_area_m2(points: &[LatLng]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    for (idx, p1) in points.iter().enumerate() {
        let p2 = points[(idx + 1) % points.len()];
        total += (p2.lng - p1.lng).to_radians()
            * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
    }
    (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

pub fn measure(shape: &Shape) -> Result<Measurement, MeasureError> {
    match shape {
        Shape::Polyline { points } => {
            check_points(points, 2)?;
            let length = path_length_m(points);
            Ok(Measurement {
                length_m: Some(length),
                label: format!("Length: {}", format_length(length)),
                ..Measurement::default()
            })
        }
        Shape::Polygon { points } => {
            check_points(points, 3)?;
            Ok(polygon_measurement(points))
        }
        Shape::Rectangle {
            south_west,
            north_east,
        } => {
            let ring = [
                *south_west,
                LatLng::new(south_west.lat, north_east.lng),
                *north_east,
                LatLng::new(north_east.lat, south_west.lng),
            ];
            check_points(&ring, 3)?;
            Ok(polygon_measurement(&ring))
        }
        Shape::Circle { center, radius_m } => {
            check_points(std::slice::from_ref(center), 1)?;
            if !radius_m.is_finite() || *radius_m <= 0.0 {
                return Err(MeasureError::InvalidRadius(*radius_m));
            }
            let area = PI * radius_m * radius_m;
            Ok(Measurement {
                length_m: Some(2.0 * PI * radius_m),
                area_m2: Some(area),
                radius_m: Some(*radius_m),
                label: format!(
                    "Radius: {}, Area: {}",
                    format_length(*radius_m),
                    format_area(area)
                ),
            })
        }
    }
}

fn polygon_measurement(ring: &[LatLng]) -> Measurement {
    let mut closed = ring.to_vec();
    closed.push(ring[0]);
    let perimeter = path_length_m(&closed);
    let area = ring_area_m2(ring);
    Measurement {
        length_m: Some(perimeter),
        area_m2: Some(area),
        radius_m: None,
        label: format!(
            "Area: {}, Perimeter: {}",
            format_area(area),
            format_length(perimeter)
        ),
    }
}

fn check_points(points: &[LatLng], needed: usize) -> Result<(), MeasureError> {
    if points.len() < needed {
        return Err(MeasureError::TooFewPoints {
            needed,
            got: points.len(),
        });
    }
    if points.iter().any(|p| !p.lat.is_finite() || !p.lng.is_finite()) {
        return Err(MeasureError::NonFiniteCoordinate);
    }
    Ok(())
}

pub fn format_length(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{meters:.1} m")
    }
}

pub fn format_area(square_meters: f64) -> String {
    if square_meters >= 1_000_000.0 {
        format!("{:.2} km²", square_meters / 1_000_000.0)
    } else if square_meters >= 10_000.0 {
        format!("{:.2} ha", square_meters / 10_000.0)
    } else {
        format!("{square_meters:.1} m²")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(actual: f64, expected: f64, tolerance: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_m(LatLng::new(0.0, 110.0), LatLng::new(0.0, 111.0));
        assert_near(d, EARTH_RADIUS_M * PI / 180.0, 1e-6);
    }

    #[test]
    fn polyline_sums_segments() {
        let shape = Shape::Polyline {
            points: vec![
                LatLng::new(0.0, 110.0),
                LatLng::new(0.0, 110.5),
                LatLng::new(0.0, 111.0),
            ],
        };
        let m = measure(&shape).expect("polyline should measure");
        assert_near(m.length_m.unwrap_or_default(), EARTH_RADIUS_M * PI / 180.0, 1e-6);
        assert!(m.area_m2.is_none());
        assert!(m.label.starts_with("Length: 111.20 km"), "{}", m.label);
    }

    #[test]
    fn small_square_area_matches_planar_estimate() {
        let side_deg: f64 = 0.01;
        let shape = Shape::Rectangle {
            south_west: LatLng::new(0.0, 110.0),
            north_east: LatLng::new(side_deg, 110.0 + side_deg),
        };
        let m = measure(&shape).expect("rectangle should measure");
        let side_m = EARTH_RADIUS_M * side_deg.to_radians();
        assert_near(m.area_m2.unwrap_or_default(), side_m * side_m, side_m * side_m * 1e-3);
        assert_near(m.length_m.unwrap_or_default(), 4.0 * side_m, 1.0);
        assert!(m.label.contains("km²"), "{}", m.label);
    }

    #[test]
    fn polygon_winding_does_not_change_area() {
        let ring = vec![
            LatLng::new(-0.1, 109.3),
            LatLng::new(-0.1, 109.4),
            LatLng::new(0.0, 109.35),
        ];
        let mut reversed = ring.clone();
        reversed.reverse();
        let a = measure(&Shape::Polygon { points: ring }).expect("polygon");
        let b = measure(&Shape::Polygon { points: reversed }).expect("polygon");
        assert_near(
            a.area_m2.unwrap_or_default(),
            b.area_m2.unwrap_or_default(),
            1e-3,
        );
    }

    #[test]
    fn circle_reports_radius_and_area() {
        let m = measure(&Shape::Circle {
            center: LatLng::new(0.85, 114.15),
            radius_m: 500.0,
        })
        .expect("circle");
        assert_eq!(m.radius_m, Some(500.0));
        assert_near(m.area_m2.unwrap_or_default(), PI * 250_000.0, 1e-6);
        assert_eq!(m.label, "Radius: 500.0 m, Area: 78.54 ha");
    }

    #[test]
    fn degenerate_shapes_are_rejected() {
        assert_eq!(
            measure(&Shape::Polyline {
                points: vec![LatLng::new(0.0, 0.0)]
            }),
            Err(MeasureError::TooFewPoints { needed: 2, got: 1 })
        );
        assert_eq!(
            measure(&Shape::Polygon {
                points: vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]
            }),
            Err(MeasureError::TooFewPoints { needed: 3, got: 2 })
        );
        assert_eq!(
            measure(&Shape::Circle {
                center: LatLng::new(0.0, 0.0),
                radius_m: 0.0
            }),
            Err(MeasureError::InvalidRadius(0.0))
        );
        assert_eq!(
            measure(&Shape::Polyline {
                points: vec![LatLng::new(f64::NAN, 0.0), LatLng::new(1.0, 1.0)]
            }),
            Err(MeasureError::NonFiniteCoordinate)
        );
    }

    #[test]
    fn units_switch_at_thresholds() {
        assert_eq!(format_length(999.0), "999.0 m");
        assert_eq!(format_length(1500.0), "1.50 km");
        assert_eq!(format_area(9_999.0), "9999.0 m²");
        assert_eq!(format_area(25_000.0), "2.50 ha");
        assert_eq!(format_area(3_000_000.0), "3.00 km²");
    }
}
