// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod capability;
pub mod config;
pub mod geo;
pub mod geometry;
pub mod itinerary;
pub mod layering;
pub mod lifecycle;
pub mod viewport;

use std::path::PathBuf;
use thiserror::Error;

pub use geo::{GeoBounds, LatLng};
pub use geometry::{compute_segments, ArrowPose, RouteSegment};
pub use itinerary::{Itinerary, ItineraryItem, Stop, StopCategory, StopList};
pub use lifecycle::{MapControls, MapLifecycle, MapProps, MapVariant};

#[derive(Error, Debug)]
pub enum TripMapError {
    #[error("Coordinate out of range: lat={lat} lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
    #[error("Mapping capability failed to load: {0}")]
    CapabilityLoad(String),
    #[error("Map widget construction failed: {0}")]
    WidgetConstruction(String),
    #[error("Cannot fit degenerate bounds")]
    DegenerateBounds,
    #[error("Map widget error: {0}")]
    Widget(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = TripMapError> = std::result::Result<T, E>;

/// Per-user configuration directory, e.g. `~/.config/tripmap` on Linux.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "tripmap", "TripMap")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
