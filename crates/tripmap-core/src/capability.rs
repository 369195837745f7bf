// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! The contract between the map lifecycle and a concrete mapping library.
//!
//! A `MapProvider` is the loadable library; each `MapWidget` it creates is one
//! viewport bound to one screen region. The lifecycle only ever talks to these
//! traits, so it can be driven by the headless viewport or a test stub.

use crate::geo::{GeoBounds, LatLng};
use crate::layering::{MarkerGlyph, PaneKind, PaneSpec, PathStyle, PopupContent};
use crate::Result;
use log::{debug, info};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// The screen region a widget is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

impl Container {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOptions {
    pub center: LatLng,
    pub zoom: f64,
    pub max_zoom: f64,
    pub dragging: bool,
    pub scroll_wheel_zoom: bool,
    pub zoom_control: bool,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkerId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub glyph: MarkerGlyph,
    pub pane: PaneKind,
    pub interactive: bool,
}

impl MarkerSpec {
    /// Interactivity always follows the pane the marker lives in.
    pub fn new(position: LatLng, glyph: MarkerGlyph, pane: PaneKind) -> Self {
        Self {
            position,
            glyph,
            pane,
            interactive: pane.interactive(),
        }
    }
}

pub trait MapProvider {
    type Map: MapWidget;

    /// Loads the mapping library. May be slow.
    fn load(&self) -> impl Future<Output = Result<()>>;

    /// Injects the library's global styling.
    fn install_styles(&self);

    fn create_map(
        &self,
        container: &Container,
        options: &MapOptions,
    ) -> impl Future<Output = Result<Self::Map>>;
}

pub trait MapWidget {
    fn add_tile_layer(&mut self, url_template: &str, attribution: &str) -> Result<()>;

    fn create_pane(&mut self, pane: &PaneSpec) -> Result<()>;

    fn add_marker(&mut self, marker: MarkerSpec) -> Result<MarkerId>;

    fn bind_popup(&mut self, marker: MarkerId, popup: PopupContent) -> Result<()>;

    fn open_popup(&mut self, marker: MarkerId);

    fn set_marker_glyph(&mut self, marker: MarkerId, glyph: MarkerGlyph) -> Result<()>;

    fn add_polyline(&mut self, points: &[LatLng], style: &PathStyle, pane: PaneKind)
        -> Result<()>;

    fn fit_bounds(&mut self, bounds: &GeoBounds) -> Result<()>;

    fn set_view(&mut self, center: LatLng, zoom: f64, animate: bool);

    fn zoom(&self) -> f64;

    /// Detaches from the container and releases everything the widget holds.
    fn dispose(&mut self) -> Result<()>;
}

/// Once-only guard around loading the mapping library and injecting its
/// styling. A failed load leaves the guard empty so the next caller retries;
/// styling is installed at most once per guard.
pub struct CapabilityGuard {
    loaded: tokio::sync::OnceCell<()>,
    styles_installed: AtomicBool,
}

impl Default for CapabilityGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityGuard {
    pub fn new() -> Self {
        Self {
            loaded: tokio::sync::OnceCell::new(),
            styles_installed: AtomicBool::new(false),
        }
    }

    /// The process-wide guard shared by every map lifecycle by default.
    pub fn global() -> Arc<CapabilityGuard> {
        static GLOBAL: OnceLock<Arc<CapabilityGuard>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(CapabilityGuard::new())))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    pub fn styles_installed(&self) -> bool {
        self.styles_installed.load(Ordering::SeqCst)
    }

    pub async fn ensure_capability_loaded<P: MapProvider>(&self, provider: &P) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                info!("Loading mapping capability");
                provider.load().await
            })
            .await?;

        if !self.styles_installed.swap(true, Ordering::SeqCst) {
            debug!("Installing map styles");
            provider.install_styles();
        }
        Ok(())
    }
}
