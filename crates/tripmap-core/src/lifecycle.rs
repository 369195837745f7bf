// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Owns one mapping widget per hosting view.
//!
//! Everything runs on a single thread. The only suspension points are the
//! capability load, widget construction and the settle delays; after each of
//! them the generation's `LifecycleToken` is checked before anything visible is
//! touched. No `RefCell` borrow is ever held across an `.await`.

use crate::capability::{
    CapabilityGuard, Container, MapOptions, MapProvider, MapWidget, MarkerId, MarkerSpec,
};
use crate::config::MapConfig;
use crate::geo::{GeoBounds, LatLng};
use crate::geometry::{compute_segments, route_bounds};
use crate::itinerary::{Stop, StopList};
use crate::layering::{MarkerGlyph, PaneKind, PathStyle, PopupContent};
use crate::Result;
use log::{debug, error, info, warn};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Disposed,
}

/// Cancellation handle for one initialization. Every continuation holds a
/// clone; disposal flips all of them at once.
#[derive(Debug, Clone)]
pub struct LifecycleToken(Rc<Cell<Lifecycle>>);

impl LifecycleToken {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(Lifecycle::Active)))
    }

    pub fn disposed() -> Self {
        Self(Rc::new(Cell::new(Lifecycle::Disposed)))
    }

    pub fn state(&self) -> Lifecycle {
        self.0.get()
    }

    pub fn is_active(&self) -> bool {
        self.state() == Lifecycle::Active
    }

    pub fn dispose(&self) {
        self.0.set(Lifecycle::Disposed);
    }
}

impl Default for LifecycleToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStatus {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Ready,
    /// Nothing to draw, or a widget already exists
    Skipped,
    /// Same stop list as the current one
    Unchanged,
    /// Disposed before initialization finished
    Cancelled,
    /// Logged and shown as an empty map
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapVariant {
    /// Numbered stops joined by curved paths with direction arrows
    #[default]
    Route,
    /// Selectable destination pins, no paths
    Discovery,
}

pub type ReadyCallback<M> = Box<dyn Fn(MapControls<M>)>;
pub type SelectCallback = Box<dyn Fn(&Stop)>;

pub struct MapProps<M> {
    pub class_name: Option<String>,
    pub variant: MapVariant,
    pub on_ready: Option<ReadyCallback<M>>,
    pub on_select: Option<SelectCallback>,
}

impl<M> Default for MapProps<M> {
    fn default() -> Self {
        Self {
            class_name: None,
            variant: MapVariant::Route,
            on_ready: None,
            on_select: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RegisteredMarker {
    id: MarkerId,
    stop_index: usize,
    position: LatLng,
}

struct Drawn {
    markers: Vec<RegisteredMarker>,
    paths: usize,
    bounds: Option<GeoBounds>,
}

/// Live state of the widget session.
struct MapViewState<M> {
    status: MapStatus,
    /// False only while the spinner should show
    loaded: bool,
    bounds: Option<GeoBounds>,
    last_error: Option<String>,
    stops: StopList,
    markers: Vec<RegisteredMarker>,
    path_count: usize,
    selected: Option<usize>,
    widget: Option<M>,
}

impl<M> MapViewState<M> {
    fn new() -> Self {
        Self {
            status: MapStatus::Uninitialized,
            loaded: false,
            bounds: None,
            last_error: None,
            stops: Arc::from(Vec::new()),
            markers: Vec::new(),
            path_count: 0,
            selected: None,
            widget: None,
        }
    }

    fn reset_for(&mut self, stops: StopList) {
        self.status = MapStatus::Initializing;
        self.loaded = false;
        self.bounds = None;
        self.last_error = None;
        self.stops = stops;
        self.markers.clear();
        self.path_count = 0;
        self.selected = None;
    }
}

/// What the hosting view hands to outside UI so it can move the map without
/// reaching into it. Becomes inert once the map is disposed.
pub struct MapControls<M> {
    session: Weak<RefCell<MapViewState<M>>>,
    token: LifecycleToken,
    focus_zoom: f64,
}

impl<M> Clone for MapControls<M> {
    fn clone(&self) -> Self {
        Self {
            session: Weak::clone(&self.session),
            token: self.token.clone(),
            focus_zoom: self.focus_zoom,
        }
    }
}

impl<M: MapWidget> MapControls<M> {
    pub fn center_on_location(&self, lat: f64, lng: f64, zoom: Option<f64>) {
        let target = LatLng::new(lat, lng);
        if !target.is_valid() {
            warn!("Ignoring center request outside valid range — lat={} lng={}", lat, lng);
            return;
        }
        if !self.token.is_active() {
            debug!("Ignoring center request on a disposed map");
            return;
        }
        let Some(session) = self.session.upgrade() else {
            return;
        };
        let mut state = session.borrow_mut();
        if let Some(map) = state.widget.as_mut() {
            map.set_view(target, zoom.unwrap_or(self.focus_zoom), true);
        }
    }

    pub fn is_active(&self) -> bool {
        self.token.is_active() && self.session.strong_count() > 0
    }
}

pub struct MapLifecycle<P: MapProvider> {
    provider: P,
    guard: Arc<CapabilityGuard>,
    config: MapConfig,
    container: Container,
    props: MapProps<P::Map>,
    session: Rc<RefCell<MapViewState<P::Map>>>,
    token: RefCell<LifecycleToken>,
    input: RefCell<Option<StopList>>,
}

impl<P: MapProvider> MapLifecycle<P> {
    pub fn new(provider: P, container: Container, config: MapConfig) -> Self {
        Self {
            provider,
            guard: CapabilityGuard::global(),
            config,
            container,
            props: MapProps::default(),
            session: Rc::new(RefCell::new(MapViewState::new())),
            token: RefCell::new(LifecycleToken::disposed()),
            input: RefCell::new(None),
        }
    }

    pub fn with_props(mut self, props: MapProps<P::Map>) -> Self {
        self.props = props;
        self
    }

    /// Replaces the process-wide capability guard, mostly for tests.
    pub fn with_guard(mut self, guard: Arc<CapabilityGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn status(&self) -> MapStatus {
        self.session.borrow().status
    }

    pub fn is_loaded(&self) -> bool {
        self.session.borrow().loaded
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        self.session.borrow().bounds
    }

    pub fn last_error(&self) -> Option<String> {
        self.session.borrow().last_error.clone()
    }

    pub fn path_count(&self) -> usize {
        self.session.borrow().path_count
    }

    /// Stop markers in route order.
    pub fn marker_ids(&self) -> Vec<MarkerId> {
        self.session.borrow().markers.iter().map(|m| m.id).collect()
    }

    pub fn selected_stop(&self) -> Option<Stop> {
        let state = self.session.borrow();
        state.selected.map(|i| state.stops[i].clone())
    }

    /// Read access to the live widget, if there is one.
    pub fn with_widget<R>(&self, f: impl FnOnce(&P::Map) -> R) -> Option<R> {
        self.session.borrow().widget.as_ref().map(f)
    }

    /// Controls for the current map, once it is ready.
    pub fn controls(&self) -> Option<MapControls<P::Map>> {
        if self.status() != MapStatus::Ready {
            return None;
        }
        Some(self.controls_for(&self.token.borrow()))
    }

    fn controls_for(&self, token: &LifecycleToken) -> MapControls<P::Map> {
        MapControls {
            session: Rc::downgrade(&self.session),
            token: token.clone(),
            focus_zoom: self.config.focus_zoom,
        }
    }

    /// Creates and draws the widget for `stops`. Stops with out-of-range
    /// coordinates are left off the map.
    pub async fn initialize(&self, stops: StopList) -> InitOutcome {
        let drawable: StopList = if stops.iter().all(Stop::is_valid) {
            Arc::clone(&stops)
        } else {
            let kept: StopList = stops.iter().filter(|s| s.is_valid()).cloned().collect();
            warn!(
                "Dropping stops with invalid coordinates — container={} dropped={}",
                self.container.id,
                stops.len() - kept.len()
            );
            kept
        };

        if drawable.is_empty() {
            debug!("No stops to map — container={}", self.container.id);
            return InitOutcome::Skipped;
        }
        {
            let state = self.session.borrow();
            if state.widget.is_some() || state.status == MapStatus::Initializing {
                debug!("Map already present — container={}", self.container.id);
                return InitOutcome::Skipped;
            }
        }

        *self.input.borrow_mut() = Some(stops);
        let token = LifecycleToken::new();
        *self.token.borrow_mut() = token.clone();
        self.session.borrow_mut().reset_for(Arc::clone(&drawable));

        let in_flight = InFlight {
            lifecycle: self,
            token: token.clone(),
            settled: false,
        };
        let outcome = self.drive(&token, drawable).await;
        in_flight.settle(outcome)
    }

    /// Everything after the session has been reset: load, build, draw, fit.
    async fn drive(&self, token: &LifecycleToken, drawable: StopList) -> InitOutcome {
        if let Err(e) = self.guard.ensure_capability_loaded(&self.provider).await {
            error!(
                "Mapping capability failed to load — container={} error={}",
                self.container.id, e
            );
            self.mark_failed(token, e.to_string());
            return InitOutcome::Failed;
        }
        if !token.is_active() {
            debug!("Disposed during capability load — container={}", self.container.id);
            return InitOutcome::Cancelled;
        }

        let center = GeoBounds::from_points(drawable.iter().map(Stop::coords))
            .map(|b| b.center())
            .unwrap_or_default();
        let options = MapOptions {
            center,
            zoom: self.config.default_zoom,
            max_zoom: self.config.max_zoom,
            dragging: true,
            scroll_wheel_zoom: true,
            zoom_control: true,
            class_name: self.props.class_name.clone(),
        };

        let mut map = match self.provider.create_map(&self.container, &options).await {
            Ok(map) => map,
            Err(e) => {
                error!(
                    "Map widget construction failed — container={} error={}",
                    self.container.id, e
                );
                self.mark_failed(token, e.to_string());
                return InitOutcome::Failed;
            }
        };
        if !token.is_active() {
            debug!(
                "Disposed while the widget was being built; releasing it — container={}",
                self.container.id
            );
            release(&mut map, &self.container);
            return InitOutcome::Cancelled;
        }

        let drawn = match self.props.variant {
            MapVariant::Route => self.draw_route(&mut map, &drawable),
            MapVariant::Discovery => self.draw_destinations(&mut map, &drawable),
        };
        let drawn = match drawn {
            Ok(drawn) => drawn,
            Err(e) => {
                error!(
                    "Drawing the route failed — container={} error={}",
                    self.container.id, e
                );
                release(&mut map, &self.container);
                self.mark_failed(token, e.to_string());
                return InitOutcome::Failed;
            }
        };
        let segments = drawn.paths;
        {
            let mut state = self.session.borrow_mut();
            state.markers = drawn.markers;
            state.path_count = drawn.paths;
            state.bounds = drawn.bounds;
            state.widget = Some(map);
        }

        // Let the widget settle its layers before measuring
        tokio::time::sleep(self.config.settle_delay()).await;
        if !token.is_active() {
            return InitOutcome::Cancelled;
        }
        self.fit_to_route(drawn.bounds);

        tokio::time::sleep(self.config.settle_delay()).await;
        if !token.is_active() {
            return InitOutcome::Cancelled;
        }
        {
            let mut state = self.session.borrow_mut();
            state.status = MapStatus::Ready;
            state.loaded = true;
        }
        info!(
            "Map ready — container={} stops={} segments={}",
            self.container.id,
            drawable.len(),
            segments
        );

        if let Some(on_ready) = &self.props.on_ready {
            on_ready(self.controls_for(token));
        }
        InitOutcome::Ready
    }

    /// Rebuilds the map when the caller hands over a different stop list.
    /// The old widget is fully disposed before the new one is created.
    pub async fn update_stops(&self, stops: StopList) -> InitOutcome {
        let current = self.input.borrow().clone();
        if let Some(current) = current {
            if Arc::ptr_eq(&current, &stops) && self.status() != MapStatus::Disposed {
                return InitOutcome::Unchanged;
            }
            self.dispose();
        }
        self.initialize(stops).await
    }

    /// Tears the widget down. Idempotent; never fails.
    pub fn dispose(&self) {
        self.token.borrow().dispose();
        let widget = {
            let mut state = self.session.borrow_mut();
            state.status = MapStatus::Disposed;
            state.markers.clear();
            state.selected = None;
            state.widget.take()
        };
        if let Some(mut map) = widget {
            release(&mut map, &self.container);
        }
    }

    /// Recentres on the clicked stop (zoom unchanged) and opens its popup.
    /// On the discovery map this also selects the destination.
    pub fn handle_marker_click(&self, marker: MarkerId) -> Option<Stop> {
        if !self.token.borrow().is_active() {
            return None;
        }
        let stop = {
            let mut guard = self.session.borrow_mut();
            let state = &mut *guard;
            let clicked = *state.markers.iter().find(|m| m.id == marker)?;
            let map = state.widget.as_mut()?;

            let zoom = map.zoom();
            map.set_view(clicked.position, zoom, true);
            map.open_popup(marker);

            if self.props.variant == MapVariant::Discovery {
                state.selected = Some(clicked.stop_index);
                for m in &state.markers {
                    let glyph = MarkerGlyph::destination(
                        m.stop_index == clicked.stop_index,
                        &self.config.palette,
                    );
                    if let Err(e) = map.set_marker_glyph(m.id, glyph) {
                        warn!("Failed to restyle marker — marker={:?} error={}", m.id, e);
                    }
                }
            }
            state.stops[clicked.stop_index].clone()
        };

        if self.props.variant == MapVariant::Discovery {
            if let Some(on_select) = &self.props.on_select {
                on_select(&stop);
            }
        }
        Some(stop)
    }

    fn draw_route(&self, map: &mut P::Map, stops: &[Stop]) -> Result<Drawn> {
        let palette = &self.config.palette;
        map.add_tile_layer(&self.config.tile_url_template, &self.config.attribution)?;
        for pane in PaneKind::ALL {
            map.create_pane(&pane.spec())?;
        }

        let segments = compute_segments(stops);
        let style = PathStyle::route(palette);
        for segment in &segments {
            map.add_polyline(&segment.points, &style, PaneKind::Paths)?;
            for arrow in &segment.arrows {
                let glyph = MarkerGlyph::Arrow {
                    heading: arrow.heading,
                    color: palette.path.clone(),
                };
                map.add_marker(MarkerSpec::new(arrow.position, glyph, PaneKind::Arrows))?;
            }
        }

        let markers = self.draw_stop_markers(map, stops, |i| {
            MarkerGlyph::route_stop(i, stops.len(), palette)
        })?;

        Ok(Drawn {
            markers,
            paths: segments.len(),
            bounds: route_bounds(stops, &segments),
        })
    }

    fn draw_destinations(&self, map: &mut P::Map, stops: &[Stop]) -> Result<Drawn> {
        map.add_tile_layer(&self.config.tile_url_template, &self.config.attribution)?;
        map.create_pane(&PaneKind::Markers.spec())?;

        let markers = self.draw_stop_markers(map, stops, |_| {
            MarkerGlyph::destination(false, &self.config.palette)
        })?;

        Ok(Drawn {
            markers,
            paths: 0,
            bounds: GeoBounds::from_points(stops.iter().map(Stop::coords)),
        })
    }

    fn draw_stop_markers(
        &self,
        map: &mut P::Map,
        stops: &[Stop],
        glyph_for: impl Fn(usize) -> MarkerGlyph,
    ) -> Result<Vec<RegisteredMarker>> {
        let mut markers = Vec::with_capacity(stops.len());
        for (i, stop) in stops.iter().enumerate() {
            let spec = MarkerSpec::new(stop.coords(), glyph_for(i), PaneKind::Markers);
            let id = map.add_marker(spec)?;
            map.bind_popup(id, PopupContent::for_stop(stop, i))?;
            markers.push(RegisteredMarker {
                id,
                stop_index: i,
                position: stop.coords(),
            });
        }
        Ok(markers)
    }

    fn fit_to_route(&self, bounds: Option<GeoBounds>) {
        let Some(bounds) = bounds else {
            return;
        };
        let mut state = self.session.borrow_mut();
        let Some(map) = state.widget.as_mut() else {
            return;
        };
        if let Err(e) = map.fit_bounds(&bounds.padded(self.config.fit_padding)) {
            warn!(
                "Could not fit route bounds; centring instead — container={} error={}",
                self.container.id, e
            );
            let zoom = self.config.focus_zoom.min(self.config.max_zoom);
            map.set_view(bounds.center(), zoom, false);
        }
    }

    /// Rolls back an initialization whose future was dropped before it
    /// settled, so the map is neither stuck loading nor left half built.
    fn abandon(&self, token: &LifecycleToken) {
        token.dispose();
        warn!(
            "Initialization dropped before it settled — container={}",
            self.container.id
        );
        // Forget the input so the same list can be handed over again
        *self.input.borrow_mut() = None;
        let widget = {
            let mut state = self.session.borrow_mut();
            state.status = MapStatus::Uninitialized;
            state.loaded = true;
            state.last_error = Some("initialization abandoned".to_string());
            state.markers.clear();
            state.path_count = 0;
            state.selected = None;
            state.widget.take()
        };
        if let Some(mut map) = widget {
            release(&mut map, &self.container);
        }
    }

    fn mark_failed(&self, token: &LifecycleToken, reason: String) {
        if !token.is_active() {
            return;
        }
        let mut state = self.session.borrow_mut();
        state.status = MapStatus::Uninitialized;
        // Hide the spinner; the map just stays blank
        state.loaded = true;
        state.last_error = Some(reason);
    }
}

/// Held across an initialization's await points. Dropping it before
/// `settle` means the caller abandoned the future mid-flight.
struct InFlight<'a, P: MapProvider> {
    lifecycle: &'a MapLifecycle<P>,
    token: LifecycleToken,
    settled: bool,
}

impl<P: MapProvider> InFlight<'_, P> {
    fn settle(mut self, outcome: InitOutcome) -> InitOutcome {
        self.settled = true;
        outcome
    }
}

impl<P: MapProvider> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        // A disposed token means someone else already tore this generation down
        if self.settled || !self.token.is_active() {
            return;
        }
        self.lifecycle.abandon(&self.token);
    }
}

impl<P: MapProvider> Drop for MapLifecycle<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn release<M: MapWidget>(map: &mut M, container: &Container) {
    match map.dispose() {
        Ok(()) => debug!("Map widget disposed — container={}", container.id),
        Err(e) => warn!(
            "Map widget teardown failed — container={} error={}",
            container.id, e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_flips_every_clone() {
        let token = LifecycleToken::new();
        let continuation = token.clone();
        assert!(continuation.is_active());

        token.dispose();
        assert_eq!(continuation.state(), Lifecycle::Disposed);
        // Disposing again is harmless
        continuation.dispose();
        assert!(!token.is_active());
    }

    #[test]
    fn test_fresh_tokens_are_independent() {
        let old = LifecycleToken::new();
        old.dispose();
        let new = LifecycleToken::new();
        assert!(new.is_active());
        assert!(!LifecycleToken::disposed().is_active());
    }
}
