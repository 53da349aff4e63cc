//! Projection of tile-local label geometry into the label plane.
//!
//! The label plane is screen pixels for labels drawn facing the viewer and
//! map-aligned pixels for labels pitched with the map.

use foundation::math::{DMat4, DVec2, DVec3, DVec4};
use projection::model::{ElevationFn, PointProjection, ProjectionModel, pixels_to_tile_units};
use scene::camera::CameraState;
use streaming::tile::OverscaledTileId;

/// Labels whose anchor lies further than this outside the viewport are skipped.
pub const VIEWPORT_PADDING_PX: f64 = 256.0;

pub trait LabelProjector {
    /// Projects tile-local coordinates into the label plane.
    fn project(&self, point: DVec2) -> PointProjection;
}

/// Normalized device coordinates to screen pixels, Y down.
pub fn ndc_to_screen(ndc: DVec2, width: f64, height: f64) -> DVec2 {
    DVec2::new(
        (ndc.x * 0.5 + 0.5) * width,
        (-ndc.y * 0.5 + 0.5) * height,
    )
}

/// Matrix from tile units to map-aligned label-plane pixels.
pub fn pitched_label_plane_matrix(
    camera: &CameraState,
    tile: &OverscaledTileId,
    rotate_with_map: bool,
) -> DMat4 {
    let s = 1.0 / pixels_to_tile_units(camera, tile, 1.0);
    let scale = DMat4::from_scale(DVec3::new(s, s, 1.0));
    if rotate_with_map {
        scale
    } else {
        scale * DMat4::from_rotation_z(-camera.bearing_rad())
    }
}

/// How much larger a label at `signed_distance` draws than one at the center.
pub fn perspective_ratio(camera_to_center_distance: f64, signed_distance: f64) -> f64 {
    0.5 + 0.5 * (camera_to_center_distance / signed_distance)
}

/// Half-extent, in NDC, of the padded viewport an anchor must fall into.
pub fn clipping_buffer(width: f64, height: f64) -> DVec2 {
    DVec2::new(
        VIEWPORT_PADDING_PX / width * 2.0 + 1.0,
        VIEWPORT_PADDING_PX / height * 2.0 + 1.0,
    )
}

pub fn is_in_padded_viewport(ndc: DVec2, buffer: DVec2) -> bool {
    ndc.x >= -buffer.x && ndc.x <= buffer.x && ndc.y >= -buffer.y && ndc.y <= buffer.y
}

/// Label-plane projector for one tile, backed by the active projection model.
pub struct LabelPlaneProjector<'a> {
    model: &'a dyn ProjectionModel,
    tile: OverscaledTileId,
    /// Feature translation in tile units.
    translation: DVec2,
    pitched_plane: Option<DMat4>,
    elevation: Option<&'a ElevationFn<'a>>,
}

impl<'a> LabelPlaneProjector<'a> {
    /// Projects into screen pixels.
    pub fn viewport(model: &'a dyn ProjectionModel, tile: OverscaledTileId) -> Self {
        Self {
            model,
            tile,
            translation: DVec2::ZERO,
            pitched_plane: None,
            elevation: None,
        }
    }

    /// Projects into map-aligned pixels.
    pub fn pitched(
        model: &'a dyn ProjectionModel,
        tile: OverscaledTileId,
        rotate_with_map: bool,
    ) -> Self {
        let matrix = pitched_label_plane_matrix(model.camera(), &tile, rotate_with_map);
        Self {
            pitched_plane: Some(matrix),
            ..Self::viewport(model, tile)
        }
    }

    pub fn with_translation(mut self, translation: DVec2) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_elevation(mut self, elevation: &'a ElevationFn<'a>) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn tile(&self) -> &OverscaledTileId {
        &self.tile
    }

    /// The point in clip space, as NDC plus `w`, regardless of the label plane.
    pub fn project_to_clip(&self, point: DVec2) -> PointProjection {
        let p = point + self.translation;
        self.model
            .project_tile_coordinates(p.x, p.y, self.tile.unwrapped(), self.elevation)
    }
}

impl LabelProjector for LabelPlaneProjector<'_> {
    fn project(&self, point: DVec2) -> PointProjection {
        match &self.pitched_plane {
            Some(matrix) => {
                let p = point + self.translation;
                let v = *matrix * DVec4::new(p.x, p.y, 0.0, 1.0);
                PointProjection {
                    point: DVec2::new(v.x / v.w, v.y / v.w),
                    signed_distance_from_camera: v.w,
                    is_occluded: false,
                }
            }
            None => {
                let camera = self.model.camera();
                let clip = self.project_to_clip(point);
                PointProjection {
                    point: ndc_to_screen(clip.point, camera.width(), camera.height()),
                    ..clip
                }
            }
        }
    }
}
