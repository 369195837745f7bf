// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Curved route geometry.
//!
//! Each pair of consecutive stops is joined by a quadratic Bezier arc whose
//! control point sits off the straight line between them, so every leg of a
//! route bends the same way. Coordinates are treated as planar degrees; stop
//! separations are city/region scale, so no geodesic correction is applied.

use crate::geo::{GeoBounds, LatLng};
use crate::itinerary::Stop;
use serde::Serialize;

/// Perpendicular offset of the control point, as a fraction of the coordinate delta.
pub const CURVE_FACTOR: f64 = 0.2;

/// Samples per curve, both endpoints included.
pub const CURVE_SAMPLES: usize = 51;

/// Curve parameters at which direction arrows are placed.
pub const ARROW_POSITIONS: [f64; 3] = [0.33, 0.66, 0.90];

/// A direction arrow along a curve. `heading` is in degrees, 0 = north,
/// clockwise positive, matching a glyph that points north by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrowPose {
    pub position: LatLng,
    pub heading: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSegment {
    pub start: LatLng,
    pub control: LatLng,
    pub end: LatLng,
    pub points: Vec<LatLng>,
    pub arrows: [ArrowPose; 3],
}

pub fn control_point(start: LatLng, end: LatLng) -> LatLng {
    let mid_lat = (start.lat + end.lat) / 2.0;
    let mid_lng = (start.lng + end.lng) / 2.0;
    let d_lat = end.lat - start.lat;
    let d_lng = end.lng - start.lng;
    LatLng::new(mid_lat - d_lng * CURVE_FACTOR, mid_lng + d_lat * CURVE_FACTOR)
}

/// `P(t) = (1-t)^2 P0 + 2(1-t)t Pc + t^2 P1`, per axis.
pub fn quadratic_point(p0: LatLng, pc: LatLng, p1: LatLng, t: f64) -> LatLng {
    let u = 1.0 - t;
    let a = u * u;
    let b = 2.0 * u * t;
    let c = t * t;
    LatLng::new(
        a * p0.lat + b * pc.lat + c * p1.lat,
        a * p0.lng + b * pc.lng + c * p1.lng,
    )
}

/// `B'(t) = 2(1-t)(Pc-P0) + 2t(P1-Pc)`, returned as (dLat, dLng).
pub fn quadratic_tangent(p0: LatLng, pc: LatLng, p1: LatLng, t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    (
        2.0 * u * (pc.lat - p0.lat) + 2.0 * t * (p1.lat - pc.lat),
        2.0 * u * (pc.lng - p0.lng) + 2.0 * t * (p1.lng - pc.lng),
    )
}

/// Compass heading of a (dLat, dLng) direction in degrees.
pub fn heading_degrees(d_lat: f64, d_lng: f64) -> f64 {
    d_lng.atan2(d_lat).to_degrees()
}

impl RouteSegment {
    pub fn between(start: LatLng, end: LatLng) -> Self {
        let control = control_point(start, end);
        let steps = (CURVE_SAMPLES - 1) as f64;

        let mut points: Vec<LatLng> = (0..CURVE_SAMPLES)
            .map(|i| quadratic_point(start, control, end, i as f64 / steps))
            .collect();
        // Pin the endpoints so they match the stops bit-for-bit
        points[0] = start;
        points[CURVE_SAMPLES - 1] = end;

        let arrows = ARROW_POSITIONS.map(|t| {
            let (d_lat, d_lng) = quadratic_tangent(start, control, end, t);
            ArrowPose {
                position: quadratic_point(start, control, end, t),
                heading: heading_degrees(d_lat, d_lng),
            }
        });

        Self {
            start,
            control,
            end,
            points,
            arrows,
        }
    }
}

/// One segment per consecutive pair of stops; empty for fewer than two.
pub fn compute_segments(stops: &[Stop]) -> Vec<RouteSegment> {
    stops
        .windows(2)
        .map(|pair| RouteSegment::between(pair[0].coords(), pair[1].coords()))
        .collect()
}

/// Bounds covering every stop and every sampled curve point.
pub fn route_bounds(stops: &[Stop], segments: &[RouteSegment]) -> Option<GeoBounds> {
    let stop_points = stops.iter().map(Stop::coords);
    let curve_points = segments.iter().flat_map(|s| s.points.iter().copied());
    GeoBounds::from_points(stop_points.chain(curve_points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn stop(name: &str, lat: f64, lng: f64) -> Stop {
        Stop::new(name, lat, lng).unwrap()
    }

    fn close(a: LatLng, b: LatLng) -> bool {
        (a.lat - b.lat).abs() < EPS && (a.lng - b.lng).abs() < EPS
    }

    #[test]
    fn test_fewer_than_two_stops() {
        assert!(compute_segments(&[]).is_empty());
        assert!(compute_segments(&[stop("solo", 1.0, 1.0)]).is_empty());
    }

    #[test]
    fn test_end_to_end_two_stops() {
        let segments = compute_segments(&[stop("X", 0.0, 0.0), stop("Y", 1.0, 1.0)]);
        assert_eq!(segments.len(), 1);

        let seg = &segments[0];
        assert_eq!(seg.points.len(), 51);
        assert!(close(seg.points[0], LatLng::new(0.0, 0.0)));
        assert!(close(seg.points[50], LatLng::new(1.0, 1.0)));
    }

    #[test]
    fn test_control_point_bows_toward_positive_longitude() {
        let c = control_point(LatLng::new(0.0, 0.0), LatLng::new(10.0, 0.0));
        assert!((c.lat - 5.0).abs() < EPS, "midLat 5 minus dLng*k (0)");
        assert!((c.lng - 2.0).abs() < EPS, "midLng 0 plus dLat*k (2)");

        let seg = RouteSegment::between(LatLng::new(0.0, 0.0), LatLng::new(10.0, 0.0));
        // Apex of the arc at t = 0.5 is half-way to the control offset
        let apex = seg.points[25];
        assert!((apex.lat - 5.0).abs() < EPS);
        assert!((apex.lng - 1.0).abs() < EPS);
        assert!(seg.points.iter().all(|p| p.lng >= 0.0));
    }

    #[test]
    fn test_segment_and_arrow_counts() {
        let stops: Vec<Stop> = (0..6)
            .map(|i| stop(&format!("S{}", i), 40.0 + i as f64 * 0.1, -3.7 + i as f64 * 0.05))
            .collect();
        let segments = compute_segments(&stops);
        assert_eq!(segments.len(), stops.len() - 1);
        let arrows: usize = segments.iter().map(|s| s.arrows.len()).sum();
        assert_eq!(arrows, 3 * (stops.len() - 1));

        for (seg, pair) in segments.iter().zip(stops.windows(2)) {
            assert!(close(seg.points[0], pair[0].coords()));
            assert!(close(*seg.points.last().unwrap(), pair[1].coords()));
        }
    }

    #[test]
    fn test_arrow_headings() {
        // Due north leg: the curve starts heading east of north and ends west of north
        let seg = RouteSegment::between(LatLng::new(0.0, 0.0), LatLng::new(10.0, 0.0));
        assert!(seg.arrows[0].heading > 0.0);
        assert!(seg.arrows[2].heading < 0.0);

        // Tangent at t=0.33: dLat = 2*0.67*5 + 2*0.33*5 = 10, dLng = 2*0.67*2 - 2*0.33*2 = 1.36
        let expected = 1.36f64.atan2(10.0).to_degrees();
        assert!((seg.arrows[0].heading - expected).abs() < 1e-9);

        // Arrow sits on the curve
        let p = quadratic_point(seg.start, seg.control, seg.end, 0.66);
        assert!(close(seg.arrows[1].position, p));
    }

    #[test]
    fn test_heading_compass_convention() {
        assert!((heading_degrees(1.0, 0.0) - 0.0).abs() < EPS);
        assert!((heading_degrees(0.0, 1.0) - 90.0).abs() < EPS);
        assert!((heading_degrees(-1.0, 0.0) - 180.0).abs() < EPS);
        assert!((heading_degrees(0.0, -1.0) + 90.0).abs() < EPS);
    }

    #[test]
    fn test_deterministic() {
        let stops = [stop("a", 35.0, 139.0), stop("b", 35.5, 139.6)];
        assert_eq!(compute_segments(&stops), compute_segments(&stops));
    }

    #[test]
    fn test_route_bounds_include_arc() {
        let stops = [stop("a", 0.0, 0.0), stop("b", 10.0, 0.0)];
        let segments = compute_segments(&stops);
        let b = route_bounds(&stops, &segments).unwrap();
        assert_eq!(b.min_lon, 0.0);
        assert!(b.max_lon > 0.9, "arc bulge must be inside the bounds");
        assert!(route_bounds(&[], &[]).is_none());
    }
}
