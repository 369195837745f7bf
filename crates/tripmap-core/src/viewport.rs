// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Headless slippy-map viewport: an in-process `MapWidget` that does the
//! Web-Mercator math a tile map would, without drawing anything.

use crate::capability::{Container, MapOptions, MapProvider, MapWidget, MarkerId, MarkerSpec};
use crate::geo::{GeoBounds, LatLng};
use crate::layering::{MarkerGlyph, PaneKind, PaneSpec, PathStyle, PopupContent};
use crate::{Result, TripMapError};
use log::debug;
use serde::Serialize;
use std::cell::Cell;

// --- Slippy Map / Mercator Math ---
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the square Web-Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.0511;

pub fn lon_to_x(lon: f64, zoom: f64) -> f64 {
    ((lon + 180.0) / 360.0) * 2.0f64.powf(zoom) * TILE_SIZE
}

pub fn lat_to_y(lat: f64, zoom: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0
        * 2.0f64.powf(zoom)
        * TILE_SIZE
}

pub fn x_to_lon(x: f64, zoom: f64) -> f64 {
    (x / (TILE_SIZE * 2.0f64.powf(zoom))) * 360.0 - 180.0
}

pub fn y_to_lat(y: f64, zoom: f64) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / (TILE_SIZE * 2.0f64.powf(zoom));
    (0.5 * (n.exp() - (-n).exp())).atan().to_degrees()
}

// --- Tiles ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoords {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl TileCoords {
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedMarker {
    pub spec: MarkerSpec,
    pub popup: Option<PopupContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub points: Vec<LatLng>,
    pub style: PathStyle,
    pub pane: PaneKind,
}

/// Camera position after the last view change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    pub center: LatLng,
    pub zoom: f64,
    pub animated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlippyViewport {
    container: Container,
    options: MapOptions,
    view: ViewState,
    tile_layer: Option<(String, String)>,
    panes: Vec<PaneSpec>,
    markers: Vec<PlacedMarker>,
    polylines: Vec<Polyline>,
    open_popup: Option<MarkerId>,
    disposed: bool,
}

impl SlippyViewport {
    pub fn new(container: Container, options: MapOptions) -> Self {
        let view = ViewState {
            center: options.center,
            zoom: options.zoom,
            animated: false,
        };
        Self {
            container,
            options,
            view,
            tile_layer: None,
            panes: Vec::new(),
            markers: Vec::new(),
            polylines: Vec::new(),
            open_popup: None,
            disposed: false,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn panes(&self) -> &[PaneSpec] {
        &self.panes
    }

    pub fn markers(&self) -> &[PlacedMarker] {
        &self.markers
    }

    pub fn marker(&self, id: MarkerId) -> Option<&PlacedMarker> {
        self.markers.get(id.0)
    }

    pub fn markers_in(&self, pane: PaneKind) -> impl Iterator<Item = &PlacedMarker> {
        self.markers.iter().filter(move |m| m.spec.pane == pane)
    }

    pub fn polylines(&self) -> &[Polyline] {
        &self.polylines
    }

    pub fn popup_marker(&self) -> Option<MarkerId> {
        self.open_popup
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The topmost interactive marker within `radius_px` of `point`, the way
    /// a click would resolve. Non-interactive panes are skipped.
    pub fn hit_test(&self, point: LatLng, radius_px: f64) -> Option<MarkerId> {
        let zoom = self.view.zoom;
        let px = lon_to_x(point.lng, zoom);
        let py = lat_to_y(point.lat, zoom);
        self.markers
            .iter()
            .enumerate()
            .filter(|(_, m)| m.spec.interactive)
            .filter(|(_, m)| {
                let mx = lon_to_x(m.spec.position.lng, zoom);
                let my = lat_to_y(m.spec.position.lat, zoom);
                (mx - px).powi(2) + (my - py).powi(2) <= radius_px.powi(2)
            })
            .max_by_key(|(i, m)| (self.pane_z(m.spec.pane), *i))
            .map(|(i, _)| MarkerId(i))
    }

    fn pane_z(&self, kind: PaneKind) -> u32 {
        self.panes
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.z_index)
            .unwrap_or(0)
    }

    /// Tiles covering the container at the current view.
    pub fn visible_tiles(&self) -> Vec<TileCoords> {
        let z = self.view.zoom.floor().clamp(0.0, 19.0) as u32;
        let num_tiles = 2u32.pow(z) as i64;

        let cx = lon_to_x(self.view.center.lng, z as f64);
        let cy = lat_to_y(self.view.center.lat, z as f64);
        let half_w = self.container.width as f64 / 2.0;
        let half_h = self.container.height as f64 / 2.0;

        let min_tx = ((cx - half_w) / TILE_SIZE).floor() as i64;
        let max_tx = ((cx + half_w) / TILE_SIZE).ceil() as i64 - 1;
        let min_ty = ((cy - half_h) / TILE_SIZE).floor() as i64;
        let max_ty = ((cy + half_h) / TILE_SIZE).ceil() as i64 - 1;

        let mut tiles = Vec::new();
        for tx in min_tx.max(0)..=max_tx.min(num_tiles - 1) {
            for ty in min_ty.max(0)..=max_ty.min(num_tiles - 1) {
                tiles.push(TileCoords {
                    x: tx as u32,
                    y: ty as u32,
                    z,
                });
            }
        }
        tiles
    }

    pub fn tile_urls(&self) -> Vec<String> {
        match &self.tile_layer {
            Some((template, _)) => self
                .visible_tiles()
                .iter()
                .map(|t| t.url(template))
                .collect(),
            None => Vec::new(),
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.disposed {
            return Err(TripMapError::Widget("viewport already disposed".to_string()));
        }
        Ok(())
    }
}

impl MapWidget for SlippyViewport {
    fn add_tile_layer(&mut self, url_template: &str, attribution: &str) -> Result<()> {
        self.check_live()?;
        self.tile_layer = Some((url_template.to_string(), attribution.to_string()));
        Ok(())
    }

    fn create_pane(&mut self, pane: &PaneSpec) -> Result<()> {
        self.check_live()?;
        if self.panes.iter().any(|p| p.name == pane.name) {
            return Err(TripMapError::Widget(format!("pane {} exists", pane.name)));
        }
        self.panes.push(*pane);
        Ok(())
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> Result<MarkerId> {
        self.check_live()?;
        if !self.panes.iter().any(|p| p.kind == marker.pane) {
            return Err(TripMapError::Widget(format!(
                "unknown pane {}",
                marker.pane.name()
            )));
        }
        self.markers.push(PlacedMarker {
            spec: marker,
            popup: None,
        });
        Ok(MarkerId(self.markers.len() - 1))
    }

    fn bind_popup(&mut self, marker: MarkerId, popup: PopupContent) -> Result<()> {
        self.check_live()?;
        let placed = self
            .markers
            .get_mut(marker.0)
            .ok_or_else(|| TripMapError::Widget(format!("no marker {}", marker.0)))?;
        placed.popup = Some(popup);
        Ok(())
    }

    fn open_popup(&mut self, marker: MarkerId) {
        if self.marker(marker).is_some_and(|m| m.popup.is_some()) {
            self.open_popup = Some(marker);
        }
    }

    fn set_marker_glyph(&mut self, marker: MarkerId, glyph: MarkerGlyph) -> Result<()> {
        self.check_live()?;
        let placed = self
            .markers
            .get_mut(marker.0)
            .ok_or_else(|| TripMapError::Widget(format!("no marker {}", marker.0)))?;
        placed.spec.glyph = glyph;
        Ok(())
    }

    fn add_polyline(
        &mut self,
        points: &[LatLng],
        style: &PathStyle,
        pane: PaneKind,
    ) -> Result<()> {
        self.check_live()?;
        self.polylines.push(Polyline {
            points: points.to_vec(),
            style: style.clone(),
            pane,
        });
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds) -> Result<()> {
        self.check_live()?;
        if bounds.is_degenerate() {
            return Err(TripMapError::DegenerateBounds);
        }

        // World pixels at zoom 0
        let x1 = lon_to_x(bounds.min_lon, 0.0);
        let x2 = lon_to_x(bounds.max_lon, 0.0);
        let y1 = lat_to_y(bounds.max_lat, 0.0);
        let y2 = lat_to_y(bounds.min_lat, 0.0);
        let span_x = (x2 - x1).abs();
        let span_y = (y2 - y1).abs();

        let zoom_x = if span_x > 0.0 {
            (self.container.width as f64 / span_x).log2()
        } else {
            f64::INFINITY
        };
        let zoom_y = if span_y > 0.0 {
            (self.container.height as f64 / span_y).log2()
        } else {
            f64::INFINITY
        };
        let zoom = zoom_x.min(zoom_y).floor().clamp(0.0, self.options.max_zoom);

        let center = LatLng::new(
            y_to_lat((y1 + y2) / 2.0, 0.0),
            x_to_lon((x1 + x2) / 2.0, 0.0),
        );
        debug!(
            "Fitted bounds — container={} zoom={} center=({:.5}, {:.5})",
            self.container.id, zoom, center.lat, center.lng
        );
        self.view = ViewState {
            center,
            zoom,
            animated: false,
        };
        Ok(())
    }

    fn set_view(&mut self, center: LatLng, zoom: f64, animate: bool) {
        if self.disposed {
            return;
        }
        self.view = ViewState {
            center,
            zoom: zoom.clamp(0.0, self.options.max_zoom),
            animated: animate,
        };
    }

    fn zoom(&self) -> f64 {
        self.view.zoom
    }

    fn dispose(&mut self) -> Result<()> {
        self.check_live()?;
        self.disposed = true;
        self.markers.clear();
        self.polylines.clear();
        self.panes.clear();
        self.open_popup = None;
        Ok(())
    }
}

/// Provider for `SlippyViewport`; there is nothing to load.
#[derive(Debug, Default)]
pub struct HeadlessProvider {
    styles_installed: Cell<usize>,
}

impl HeadlessProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style_installs(&self) -> usize {
        self.styles_installed.get()
    }
}

impl MapProvider for HeadlessProvider {
    type Map = SlippyViewport;

    async fn load(&self) -> Result<()> {
        Ok(())
    }

    fn install_styles(&self) {
        self.styles_installed.set(self.styles_installed.get() + 1);
    }

    async fn create_map(
        &self,
        container: &Container,
        options: &MapOptions,
    ) -> Result<SlippyViewport> {
        if container.width == 0 || container.height == 0 {
            return Err(TripMapError::WidgetConstruction(format!(
                "container {} has no size",
                container.id
            )));
        }
        Ok(SlippyViewport::new(container.clone(), options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(center: LatLng) -> MapOptions {
        MapOptions {
            center,
            zoom: 3.0,
            max_zoom: 18.0,
            dragging: true,
            scroll_wheel_zoom: true,
            zoom_control: true,
            class_name: None,
        }
    }

    fn viewport(width: u32, height: u32) -> SlippyViewport {
        SlippyViewport::new(Container::new("map", width, height), options(LatLng::default()))
    }

    #[test]
    fn test_mercator_roundtrip_origin() {
        assert!((lon_to_x(0.0, 0.0) - 128.0).abs() < 1e-9);
        assert!((lat_to_y(0.0, 0.0) - 128.0).abs() < 1e-9);
        assert!((x_to_lon(128.0, 0.0)).abs() < 1e-9);
        assert!((y_to_lat(128.0, 0.0)).abs() < 1e-9);
        assert!((y_to_lat(lat_to_y(51.5, 5.0), 5.0) - 51.5).abs() < 1e-9);
    }

    #[test]
    fn test_tile_url_template() {
        let t = TileCoords { x: 3, y: 5, z: 4 };
        assert_eq!(
            t.url("https://tile.openstreetmap.org/{z}/{x}/{y}.png"),
            "https://tile.openstreetmap.org/4/3/5.png"
        );
    }

    #[test]
    fn test_fit_bounds_zoom_and_center() {
        let mut vp = viewport(512, 512);
        vp.fit_bounds(&GeoBounds::new(-10.0, 10.0, -10.0, 10.0)).unwrap();
        let view = vp.view();
        // 20 degrees of longitude is ~14.2 px at zoom 0, so 512 px fits at zoom 5
        assert_eq!(view.zoom, 5.0);
        assert!(view.center.lat.abs() < 1e-9);
        assert!(view.center.lng.abs() < 1e-9);
    }

    #[test]
    fn test_fit_degenerate_bounds_fails() {
        let mut vp = viewport(400, 300);
        let err = vp
            .fit_bounds(&GeoBounds::around(LatLng::new(1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, TripMapError::DegenerateBounds));
        assert_eq!(vp.view().zoom, 3.0, "view untouched on failure");
    }

    #[test]
    fn test_visible_tiles_at_zoom_zero() {
        let mut vp = viewport(256, 256);
        vp.set_view(LatLng::default(), 0.0, false);
        assert_eq!(vp.visible_tiles(), vec![TileCoords { x: 0, y: 0, z: 0 }]);

        vp.set_view(LatLng::default(), 1.0, false);
        // Centre of a 512 px world with a 256 px window touches all four tiles
        assert_eq!(vp.visible_tiles().len(), 4);
    }

    #[test]
    fn test_markers_need_a_pane() {
        let mut vp = viewport(100, 100);
        let glyph = MarkerGlyph::Arrow {
            heading: 0.0,
            color: "#000".to_string(),
        };
        let spec = MarkerSpec::new(LatLng::default(), glyph, PaneKind::Arrows);
        assert!(vp.add_marker(spec.clone()).is_err());

        vp.create_pane(&PaneKind::Arrows.spec()).unwrap();
        assert_eq!(vp.add_marker(spec).unwrap(), MarkerId(0));
        assert!(vp.create_pane(&PaneKind::Arrows.spec()).is_err());
    }

    #[test]
    fn test_hit_test_skips_click_through_panes() {
        let mut vp = viewport(400, 400);
        for pane in PaneKind::ALL {
            vp.create_pane(&pane.spec()).unwrap();
        }
        let here = LatLng::new(48.0, 2.0);
        let arrow = MarkerGlyph::Arrow {
            heading: 45.0,
            color: "#000".to_string(),
        };
        let pin = MarkerGlyph::Numbered {
            label: "1".to_string(),
            color: "#fff".to_string(),
        };
        vp.add_marker(MarkerSpec::new(here, arrow.clone(), PaneKind::Arrows))
            .unwrap();
        let stop = vp
            .add_marker(MarkerSpec::new(here, pin, PaneKind::Markers))
            .unwrap();
        vp.add_marker(MarkerSpec::new(here, arrow, PaneKind::Arrows))
            .unwrap();

        assert_eq!(vp.hit_test(here, 10.0), Some(stop));
        assert_eq!(vp.hit_test(LatLng::new(-48.0, -2.0), 10.0), None);
    }

    #[test]
    fn test_dispose_twice_errors_on_widget() {
        let mut vp = viewport(10, 10);
        vp.dispose().unwrap();
        assert!(vp.is_disposed());
        assert!(vp.dispose().is_err());
    }
}
