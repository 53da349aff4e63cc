use std::fs;
use std::path::{Path, PathBuf};

use projection::model::{ProjectionData, ProjectionError, ProjectionOptions};
use projection::transform::MapTransform;
use runtime::frame::Frame;
use scene::camera::{CameraConstraints, CameraState, LngLat};
use serde::{Deserialize, Serialize};
use streaming::coverage::{CoveredTile, CoveringTilesOptions};
use thiserror::Error;
use tracing::debug;

/// Simulated frame length when advancing the transform.
pub const FRAME_DT_S: f64 = 1.0 / 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse map config: {0}")]
    Json(#[from] serde_json::Error),
}

/// A map view as read from JSON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width: f64,
    pub height: f64,
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub elevation_m: f64,
    pub constraints: CameraConstraints,
    pub projection: ProjectionOptions,
    pub coverage: CoveringTilesOptions,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            center: LngLat::new(0.0, 0.0),
            zoom: 0.0,
            pitch: 0.0,
            bearing: 0.0,
            elevation_m: 0.0,
            constraints: CameraConstraints::default(),
            projection: ProjectionOptions::default(),
            coverage: CoveringTilesOptions::default(),
        }
    }
}

impl MapConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// The camera this config describes, with every value clamped.
    pub fn camera(&self) -> CameraState {
        let mut camera = CameraState::new(self.constraints, self.width, self.height);
        camera.set_center(self.center);
        camera.set_zoom(self.zoom);
        camera.set_pitch(self.pitch);
        camera.set_bearing(self.bearing);
        camera.set_elevation(self.elevation_m);
        camera
    }

    /// A transform advanced through `frames` frames, at least one.
    pub fn transform(&self, frames: u64) -> Result<MapTransform, ProjectionError> {
        let mut transform = MapTransform::from_options(self.camera(), self.projection);
        let mut frame = Frame::new(0, FRAME_DT_S);
        for _ in 0..frames.max(1) {
            transform.update(frame)?;
            frame = frame.next();
        }
        debug!(
            projection = transform.projection().name(),
            frames = frames.max(1),
            "transform ready"
        );
        Ok(transform)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverReport {
    pub projection: &'static str,
    pub zoom: f64,
    pub tiles: Vec<CoveredTile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileProjection {
    /// `z/x/y` of the canonical tile.
    pub tile: String,
    pub wrap: i32,
    pub data: ProjectionData,
}

pub fn cover(config: &MapConfig, frames: u64) -> Result<CoverReport, ProjectionError> {
    let transform = config.transform(frames)?;
    Ok(CoverReport {
        projection: transform.projection().name(),
        zoom: transform.camera().zoom(),
        tiles: transform.covering_tiles(&config.coverage, None),
    })
}

/// Projection data for every tile covering the view.
pub fn project(config: &MapConfig, frames: u64) -> Result<Vec<TileProjection>, ProjectionError> {
    let transform = config.transform(frames)?;
    let tiles = transform.covering_tiles(&config.coverage, None);
    Ok(tiles
        .iter()
        .map(|covered| {
            let unwrapped = covered.id.unwrapped();
            TileProjection {
                tile: unwrapped.canonical.to_string(),
                wrap: unwrapped.wrap,
                data: transform.projection_data(unwrapped),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_config_takes_defaults() {
        let config = MapConfig::from_json(
            r#"{"zoom": 3.5, "center": {"lng": 10.0, "lat": 50.0}, "projection": {"globe_enabled": true}}"#,
        )
        .unwrap();
        assert_eq!(config.zoom, 3.5);
        assert_eq!(config.center, LngLat::new(10.0, 50.0));
        assert!(config.projection.globe_enabled);
        assert!(config.projection.animate_transition);
        assert_eq!(config.width, 1024.0);
        assert_eq!(config.coverage, CoveringTilesOptions::default());
    }

    #[test]
    fn bad_json_is_reported() {
        let err = MapConfig::from_json("{ zoom: 1 }").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("parse map config"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = MapConfig::load(Path::new("/nonexistent/map.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn camera_values_are_clamped() {
        let config = MapConfig {
            zoom: 40.0,
            pitch: 120.0,
            ..MapConfig::default()
        };
        let camera = config.camera();
        assert_eq!(camera.zoom(), config.constraints.max_zoom);
        assert_eq!(camera.pitch_deg(), config.constraints.max_pitch);
    }

    #[test]
    fn world_view_covers_the_root_tile() {
        let config = MapConfig {
            width: 512.0,
            height: 512.0,
            ..MapConfig::default()
        };
        let report = cover(&config, 1).unwrap();
        assert_eq!(report.projection, "globe");
        assert!(report.tiles.iter().any(|t| t.id.canonical.z == 0 && t.id.wrap == 0));
    }

    #[test]
    fn projection_data_per_covered_tile() {
        let config = MapConfig {
            zoom: 2.0,
            projection: ProjectionOptions {
                globe_enabled: true,
                ..ProjectionOptions::default()
            },
            ..MapConfig::default()
        };
        let tiles = project(&config, 3).unwrap();
        assert!(!tiles.is_empty());
        for tile in &tiles {
            assert_ne!(tile.data.clipping_plane, [0.0; 4]);
            assert_eq!(tile.data.projection_transition, 1.0);
        }
        let json = serde_json::to_value(&tiles[0]).unwrap();
        assert_eq!(json["data"]["main_matrix"].as_array().unwrap().len(), 16);
    }
}
