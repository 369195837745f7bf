// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::itinerary::Stop;
use serde::{Deserialize, Serialize};

/// Drawing layers, declared top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PaneKind {
    Markers,
    Arrows,
    Paths,
}

impl PaneKind {
    pub const ALL: [PaneKind; 3] = [PaneKind::Markers, PaneKind::Arrows, PaneKind::Paths];

    pub fn name(&self) -> &'static str {
        match self {
            PaneKind::Markers => "route-markers",
            PaneKind::Arrows => "route-arrows",
            PaneKind::Paths => "route-paths",
        }
    }

    pub fn z_index(&self) -> u32 {
        match self {
            PaneKind::Markers => 650,
            PaneKind::Arrows => 450,
            PaneKind::Paths => 400,
        }
    }

    /// Arrows and paths let clicks fall through to whatever is beneath.
    pub fn interactive(&self) -> bool {
        matches!(self, PaneKind::Markers)
    }

    pub fn spec(&self) -> PaneSpec {
        PaneSpec {
            kind: *self,
            name: self.name(),
            z_index: self.z_index(),
            interactive: self.interactive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaneSpec {
    pub kind: PaneKind,
    pub name: &'static str,
    pub z_index: u32,
    pub interactive: bool,
}

/// Hex colour such as `#22c55e`.
pub type Color = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPalette {
    pub start: Color,
    pub middle: Color,
    pub end: Color,
    pub selected: Color,
    pub path: Color,
}

impl Default for MarkerPalette {
    fn default() -> Self {
        Self {
            start: "#22c55e".to_string(),
            middle: "#3b82f6".to_string(),
            end: "#ef4444".to_string(),
            selected: "#f59e0b".to_string(),
            path: "#6366f1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerRole {
    Start,
    Middle,
    End,
}

impl MarkerRole {
    /// First stop starts, last stop ends, everything between is middle.
    /// A single stop counts as a start.
    pub fn for_index(index: usize, count: usize) -> Self {
        if index == 0 {
            MarkerRole::Start
        } else if index + 1 == count {
            MarkerRole::End
        } else {
            MarkerRole::Middle
        }
    }

    pub fn color<'a>(&self, palette: &'a MarkerPalette) -> &'a str {
        match self {
            MarkerRole::Start => &palette.start,
            MarkerRole::Middle => &palette.middle,
            MarkerRole::End => &palette.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MarkerGlyph {
    /// Numbered route stop
    Numbered { label: String, color: Color },
    /// Destination pin on the discovery map
    Destination { color: Color, selected: bool },
    /// North-pointing arrow rotated by `heading` degrees
    Arrow { heading: f64, color: Color },
}

impl MarkerGlyph {
    pub fn route_stop(index: usize, count: usize, palette: &MarkerPalette) -> Self {
        MarkerGlyph::Numbered {
            label: (index + 1).to_string(),
            color: MarkerRole::for_index(index, count).color(palette).to_string(),
        }
    }

    pub fn destination(selected: bool, palette: &MarkerPalette) -> Self {
        let color = if selected {
            palette.selected.clone()
        } else {
            palette.middle.clone()
        };
        MarkerGlyph::Destination { color, selected }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStyle {
    pub color: Color,
    pub weight: f64,
    pub opacity: f64,
    pub dash: Option<String>,
}

impl PathStyle {
    pub fn route(palette: &MarkerPalette) -> Self {
        Self {
            color: palette.path.clone(),
            weight: 3.0,
            opacity: 0.8,
            dash: Some("8 6".to_string()),
        }
    }
}

/// Content of the info popup bound to a stop marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupContent {
    pub title: String,
    /// 1-based position in the route
    pub index: usize,
    pub description: Option<String>,
    pub category: Option<String>,
    pub badges: Vec<String>,
}

impl PopupContent {
    pub fn for_stop(stop: &Stop, index: usize) -> Self {
        let mut badges = Vec::new();
        if let Some(day) = stop.day {
            badges.push(format!("Day {}", day));
        }
        if let Some(time) = &stop.time {
            badges.push(time.clone());
        }
        Self {
            title: stop.name.clone(),
            index: index + 1,
            description: stop.description.clone(),
            category: stop.category.map(|c| c.label().to_string()),
            badges,
        }
    }
}
