//! The contract shared by every projection model.

use foundation::math::{DMat4, DVec2, EXTENT, GpuMatrix};
use runtime::frame::Frame;
use scene::camera::{CameraState, LngLat};
use serde::{Deserialize, Serialize};
use streaming::coverage::CoverageView;
use streaming::tile::{OverscaledTileId, UnwrappedTileId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// A camera matrix has no inverse. Valid camera parameters never produce one.
    #[error("{matrix} matrix is not invertible")]
    NonInvertibleMatrix { matrix: &'static str },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    pub globe_enabled: bool,
    /// When false, globe toggles jump straight to their end state.
    pub animate_transition: bool,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            globe_enabled: false,
            animate_transition: true,
        }
    }
}

/// Terrain height in meters at tile-local coordinates.
pub type ElevationFn<'a> = dyn Fn(f64, f64) -> f64 + 'a;

/// A tile-local point after projection.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointProjection {
    /// Normalized device coordinates (`clip.xy / clip.w`).
    pub point: DVec2,
    /// Clip-space `w`; non-positive means behind the camera.
    pub signed_distance_from_camera: f64,
    /// On the far side of the globe.
    pub is_occluded: bool,
}

/// Everything the GPU needs to place one tile.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ProjectionData {
    pub main_matrix: GpuMatrix,
    /// Flat tile matrix, blended against `main_matrix` by `projection_transition`.
    pub fallback_matrix: GpuMatrix,
    /// Tile origin and tile-unit size in normalized Mercator: `[x, y, sx, sy]`.
    pub tile_mercator_coords: [f32; 4],
    pub clipping_plane: [f32; 4],
    pub projection_transition: f32,
}

/// What a feature's pixel translation is relative to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslateAnchor {
    #[default]
    Map,
    Viewport,
}

/// Turns camera state and tile identity into GPU matrices and projected points.
///
/// [`ProjectionModel::update_projection`] runs once per frame before any other
/// call; the remaining methods read the state it derived.
pub trait ProjectionModel: CoverageView {
    fn name(&self) -> &'static str;

    fn update_projection(&mut self, camera: &CameraState, frame: Frame) -> Result<(), ProjectionError>;

    /// `override_matrix` replaces the flat tile matrix.
    fn projection_data(&self, tile: UnwrappedTileId, override_matrix: Option<&DMat4>) -> ProjectionData;

    fn project_tile_coordinates(
        &self,
        x: f64,
        y: f64,
        tile: UnwrappedTileId,
        elevation: Option<&ElevationFn<'_>>,
    ) -> PointProjection;

    fn is_occluded(&self, x: f64, y: f64, tile: UnwrappedTileId) -> bool;

    /// Ratio of on-screen size to flat-map size at the center.
    fn pixel_scale(&self) -> f64;

    /// True while something animates and the host should keep drawing.
    fn is_rendering_dirty(&self) -> bool;

    /// Turns the globe on or off from the next update. Models without a
    /// globe ignore it.
    fn set_globe_enabled(&mut self, _enabled: bool) {}

    /// Makes the next update jump to its end state instead of animating.
    fn skip_next_animation(&mut self) {}

    /// Screen pixel to geographic position; `None` when the ray misses the map.
    fn unproject_screen_point(&self, screen: DVec2) -> Option<LngLat>;

    /// Converts a feature's pixel translation into tile units of `tile`,
    /// rotating it by the bearing when it is anchored to the viewport.
    fn translate_position(
        &self,
        tile: &OverscaledTileId,
        translate: DVec2,
        anchor: TranslateAnchor,
    ) -> DVec2 {
        if translate == DVec2::ZERO {
            return DVec2::ZERO;
        }
        let camera = self.camera();
        let rotated = match anchor {
            TranslateAnchor::Viewport => rotate_vec(translate, camera.bearing_rad()),
            TranslateAnchor::Map => translate,
        };
        rotated * pixels_to_tile_units(camera, tile, 1.0)
    }
}

/// Tile units covered by `pixels` screen pixels for tiles of `tile`'s zoom.
pub fn pixels_to_tile_units(camera: &CameraState, tile: &OverscaledTileId, pixels: f64) -> f64 {
    pixels * EXTENT / (camera.tile_size() * (camera.zoom() - f64::from(tile.overscaled_z)).exp2())
}

pub(crate) fn rotate_vec(v: DVec2, angle: f64) -> DVec2 {
    DVec2::from_angle(angle).rotate(v)
}

pub(crate) fn invert(matrix: &DMat4, name: &'static str) -> Result<DMat4, ProjectionError> {
    let det = matrix.determinant();
    if det == 0.0 || !det.is_finite() {
        return Err(ProjectionError::NonInvertibleMatrix { matrix: name });
    }
    Ok(matrix.inverse())
}

/// Screen pixels to normalized device coordinates.
pub(crate) fn screen_to_ndc(camera: &CameraState, screen: DVec2) -> DVec2 {
    DVec2::new(
        screen.x / camera.width() * 2.0 - 1.0,
        1.0 - screen.y / camera.height() * 2.0,
    )
}

/// Normalized Mercator coordinates of each tile: origin, then tile-unit size.
pub(crate) fn tile_mercator_coords(tile: UnwrappedTileId) -> [f32; 4] {
    let scale = tile.canonical.mercator_size();
    let origin = tile.canonical.mercator_origin();
    [
        origin.x as f32,
        origin.y as f32,
        (scale / EXTENT) as f32,
        (scale / EXTENT) as f32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use streaming::tile::TileCoord;

    #[test]
    fn singular_matrix_is_rejected() {
        let err = invert(&DMat4::ZERO, "test").unwrap_err();
        assert_eq!(err, ProjectionError::NonInvertibleMatrix { matrix: "test" });
        assert_eq!(err.to_string(), "test matrix is not invertible");
        assert!(invert(&DMat4::IDENTITY, "test").is_ok());
    }

    #[test]
    fn mercator_coords_of_a_tile() {
        let coords = tile_mercator_coords(UnwrappedTileId::new(0, TileCoord::new(1, 1, 0)));
        assert_eq!(coords[0], 0.5);
        assert_eq!(coords[1], 0.0);
        assert_eq!(coords[2], (0.5 / EXTENT) as f32);
    }

    #[test]
    fn options_default_when_missing() {
        let options: ProjectionOptions = serde_json::from_str(r#"{"globe_enabled": true}"#).unwrap();
        assert!(options.globe_enabled);
        assert!(options.animate_transition);
        let anchor: TranslateAnchor = serde_json::from_str(r#""viewport""#).unwrap();
        assert_eq!(anchor, TranslateAnchor::Viewport);
    }
}
