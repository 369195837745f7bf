// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::geo::LatLng;
use crate::{Result, TripMapError};
use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// A route's stops. Replaced wholesale, never mutated in place; the map
/// lifecycle compares lists by pointer identity.
pub type StopList = Arc<[Stop]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopCategory {
    Attraction,
    Restaurant,
    Hotel,
    Transport,
    City,
}

impl StopCategory {
    pub fn label(&self) -> &'static str {
        match self {
            StopCategory::Attraction => "Attraction",
            StopCategory::Restaurant => "Restaurant",
            StopCategory::Hotel => "Hotel",
            StopCategory::Transport => "Transport",
            StopCategory::City => "City",
        }
    }
}

/// A named point of interest on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<StopCategory>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub day: Option<u32>,
}

impl Stop {
    /// Validates the coordinate range before building the stop.
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Result<Self> {
        if !LatLng::new(lat, lng).is_valid() {
            return Err(TripMapError::InvalidCoordinate { lat, lng });
        }
        Ok(Self {
            name: name.into(),
            lat,
            lng,
            description: None,
            category: None,
            time: None,
            day: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: StopCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }

    pub fn coords(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.coords().is_valid()
    }
}

/// One entry of an itinerary as the caller supplies it. Coordinates are
/// optional: activities without a known location still show up in lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItem {
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<StopCategory>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub day: Option<u32>,
}

impl ItineraryItem {
    /// `None` when coordinates are missing or out of range.
    pub fn to_stop(&self) -> Option<Stop> {
        let (lat, lng) = self.lat.zip(self.lng)?;
        let mut stop = Stop::new(self.name.clone(), lat, lng).ok()?;
        stop.description = self.description.clone();
        stop.category = self.category;
        stop.time = self.time.clone();
        stop.day = self.day;
        Some(stop)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default)]
    pub title: Option<String>,
    pub items: Vec<ItineraryItem>,
}

impl Itinerary {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read itinerary {}", path.display()))?;
        let itinerary = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse itinerary {}", path.display()))?;
        Ok(itinerary)
    }

    /// Stops that can be placed on a map, in itinerary order.
    pub fn mappable_stops(&self) -> StopList {
        self.collect_stops(|_| true)
    }

    pub fn stops_for_day(&self, day: u32) -> StopList {
        self.collect_stops(|item| item.day == Some(day))
    }

    /// Distinct day indices in ascending order.
    pub fn days(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter_map(|i| i.day)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn collect_stops(&self, keep: impl Fn(&ItineraryItem) -> bool) -> StopList {
        self.items
            .iter()
            .filter(|item| keep(item))
            .filter_map(|item| {
                let stop = item.to_stop();
                if stop.is_none() {
                    debug!("Skipping unmappable itinerary item — name={}", item.name);
                }
                stop
            })
            .collect()
    }
}
