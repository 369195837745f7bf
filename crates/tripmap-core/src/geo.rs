// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};

/// A planar latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// A zero-area box around a single point.
    pub fn around(point: LatLng) -> Self {
        Self::new(point.lat, point.lat, point.lng, point.lng)
    }

    /// Smallest box covering every point, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::around(first);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.min_lat = self.min_lat.min(point.lat);
        self.max_lat = self.max_lat.max(point.lat);
        self.min_lon = self.min_lon.min(point.lng);
        self.max_lon = self.max_lon.max(point.lng);
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// True when the box collapses to a single point.
    pub fn is_degenerate(&self) -> bool {
        self.max_lat - self.min_lat <= f64::EPSILON && self.max_lon - self.min_lon <= f64::EPSILON
    }

    /// Grow each side by `ratio` of the span on that axis.
    pub fn padded(&self, ratio: f64) -> Self {
        let dlat = (self.max_lat - self.min_lat) * ratio;
        let dlon = (self.max_lon - self.min_lon) * ratio;
        Self::new(
            (self.min_lat - dlat).max(-90.0),
            (self.max_lat + dlat).min(90.0),
            (self.min_lon - dlon).max(-180.0),
            (self.max_lon + dlon).min(180.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_and_center() {
        let b = GeoBounds::from_points([
            LatLng::new(48.85, 2.35),
            LatLng::new(45.76, 4.83),
            LatLng::new(43.30, 5.37),
        ])
        .unwrap();

        assert_eq!(b.min_lat, 43.30);
        assert_eq!(b.max_lat, 48.85);
        assert_eq!(b.min_lon, 2.35);
        assert_eq!(b.max_lon, 5.37);
        assert!(b.contains(45.76, 4.83));

        let c = b.center();
        assert!((c.lat - 46.075).abs() < 1e-9);
        assert!((c.lng - 3.86).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert!(GeoBounds::from_points(Vec::new()).is_none());

        let single = GeoBounds::around(LatLng::new(10.0, 20.0));
        assert!(single.is_degenerate());
        // Padding a point is still a point
        assert!(single.padded(0.1).is_degenerate());

        // A flat east-west box still has a width to fit
        let line = GeoBounds::new(10.0, 10.0, 20.0, 21.0);
        assert!(!line.is_degenerate());
    }

    #[test]
    fn test_padded_clamps_to_world() {
        let b = GeoBounds::new(-89.0, 89.0, -179.0, 179.0).padded(0.5);
        assert_eq!(b.min_lat, -90.0);
        assert_eq!(b.max_lat, 90.0);
        assert_eq!(b.min_lon, -180.0);
        assert_eq!(b.max_lon, 180.0);
    }

    #[test]
    fn test_latlng_validity() {
        assert!(LatLng::new(90.0, -180.0).is_valid());
        assert!(!LatLng::new(90.1, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 180.5).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }
}
