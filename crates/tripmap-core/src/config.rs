// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::layering::MarkerPalette;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "map_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Slippy tile URL with `{z}`, `{x}` and `{y}` placeholders
    pub tile_url_template: String,
    pub attribution: String,
    /// Zoom used while the widget is first shown, before fitting
    pub default_zoom: f64,
    /// Zoom used by `center_on_location` when the caller passes none
    pub focus_zoom: f64,
    pub max_zoom: f64,
    /// Extra margin around fitted bounds, as a fraction of the span
    pub fit_padding: f64,
    /// Pause before fitting bounds and before handing out controls
    pub settle_delay_ms: u64,
    pub palette: MarkerPalette,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            default_zoom: 4.0,
            focus_zoom: 15.0,
            max_zoom: 18.0,
            fit_padding: 0.1,
            settle_delay_ms: 100,
            palette: MarkerPalette::default(),
        }
    }
}

impl MapConfig {
    /// Loads the per-user config, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let path = Self::get_config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                debug!("Loaded map config — path={}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring invalid map config — path={} error={:#}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read map config {}", path.display()))?;
        let config: MapConfig =
            serde_json::from_str(&content).context("Failed to parse map config")?;
        Ok(config)
    }

    pub fn get_config_path() -> PathBuf {
        crate::get_config_root().join(CONFIG_FILE_NAME)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r##"{"focus_zoom": 12.5, "palette": {"start": "#000000", "middle": "#111111", "end": "#222222", "selected": "#333333", "path": "#444444"}}"##,
        )
        .unwrap();

        let config = MapConfig::load_from(&path).unwrap();
        assert_eq!(config.focus_zoom, 12.5);
        assert_eq!(config.palette.start, "#000000");
        assert_eq!(config.default_zoom, MapConfig::default().default_zoom);
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();
        assert!(MapConfig::load_from(&path).is_err());
        assert!(MapConfig::load_from(dir.path().join("missing.json")).is_err());
    }
}
