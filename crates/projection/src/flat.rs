//! Web Mercator on a flat plane.

use std::f64::consts::{FRAC_PI_2, PI};

use foundation::bounds::Aabb3;
use foundation::math::{
    DMat4, DVec2, DVec3, DVec4, EXTENT, lat_from_mercator_y, lng_from_mercator_x,
    mercator_z_from_altitude, to_gpu_matrix,
};
use runtime::frame::Frame;
use scene::camera::{CameraState, LngLat};
use scene::visibility::{Frustum, IntersectionResult};
use streaming::coverage::{CoverageView, mercator_bounds};
use streaming::tile::{TileCoord, UnwrappedTileId};

use crate::model::{
    ElevationFn, PointProjection, ProjectionData, ProjectionError, ProjectionModel, invert,
    screen_to_ndc, tile_mercator_coords,
};

#[derive(Debug, Clone)]
pub struct FlatProjection {
    camera: CameraState,
    /// World pixels (z in meters) to clip space.
    proj_matrix: DMat4,
    /// Normalized Mercator to clip space.
    mercator_matrix: DMat4,
    inverse_mercator_matrix: DMat4,
    frustum: Frustum,
}

impl FlatProjection {
    pub fn new(camera: &CameraState) -> Self {
        Self {
            camera: camera.clone(),
            proj_matrix: DMat4::IDENTITY,
            mercator_matrix: DMat4::IDENTITY,
            inverse_mercator_matrix: DMat4::IDENTITY,
            frustum: Frustum::from_view_projection(&DMat4::IDENTITY),
        }
    }

    pub fn proj_matrix(&self) -> &DMat4 {
        &self.proj_matrix
    }

    pub fn mercator_matrix(&self) -> &DMat4 {
        &self.mercator_matrix
    }

    /// Tile-local coordinates (z in meters) to clip space.
    pub fn tile_matrix(&self, tile: UnwrappedTileId) -> DMat4 {
        let canonical = tile.canonical;
        let scale = self.camera.world_size() / TileCoord::tiles_per_axis(canonical.z) as f64;
        let origin = DVec3::new(
            tile.unwrapped_x() as f64 * scale,
            canonical.y as f64 * scale,
            0.0,
        );
        self.proj_matrix
            * DMat4::from_translation(origin)
            * DMat4::from_scale(DVec3::new(scale / EXTENT, scale / EXTENT, 1.0))
    }
}

/// Perspective far plane distance that still reaches the top of the viewport
/// at the current pitch.
fn far_plane_distance(camera: &CameraState) -> f64 {
    let half_fov = camera.fov_rad() * 0.5;
    let ccd = camera.camera_to_center_distance();
    let ground_angle = FRAC_PI_2 + camera.pitch_rad();
    let top_half_surface_distance =
        half_fov.sin() * ccd / (PI - ground_angle - half_fov).clamp(0.01, PI - 0.01).sin();
    let furthest = (FRAC_PI_2 - camera.pitch_rad()).cos() * top_half_surface_distance + ccd;
    furthest * 1.01
}

impl CoverageView for FlatProjection {
    fn camera(&self) -> &CameraState {
        &self.camera
    }

    fn tile_visibility(
        &self,
        tile: TileCoord,
        wrap: i32,
        elevation: Option<(f64, f64)>,
    ) -> IntersectionResult {
        let mut bounds = mercator_bounds(tile, wrap);
        if let Some((min, max)) = elevation {
            let meter = mercator_z_from_altitude(1.0, self.camera.center().lat);
            bounds = Aabb3::new(
                DVec3::new(bounds.min.x, bounds.min.y, min * meter),
                DVec3::new(bounds.max.x, bounds.max.y, max * meter),
            );
        }
        self.frustum.intersect_aabb(&bounds)
    }
}

impl ProjectionModel for FlatProjection {
    fn name(&self) -> &'static str {
        "mercator"
    }

    fn update_projection(&mut self, camera: &CameraState, _frame: Frame) -> Result<(), ProjectionError> {
        self.camera = camera.clone();
        let ccd = camera.camera_to_center_distance();
        let center = camera.center_point();
        let near = camera.height() / 50.0;
        let far = far_plane_distance(camera);

        let world_matrix = DMat4::perspective_rh_gl(camera.fov_rad(), camera.aspect(), near, far)
            * DMat4::from_scale(DVec3::new(1.0, -1.0, 1.0))
            * DMat4::from_translation(DVec3::new(0.0, 0.0, -ccd))
            * DMat4::from_rotation_x(camera.pitch_rad())
            * DMat4::from_rotation_z(-camera.bearing_rad())
            * DMat4::from_translation(DVec3::new(
                -center.x,
                -center.y,
                -camera.elevation_m() * camera.pixels_per_meter(),
            ));

        let world_size = camera.world_size();
        self.mercator_matrix = world_matrix * DMat4::from_scale(DVec3::splat(world_size));
        self.proj_matrix =
            world_matrix * DMat4::from_scale(DVec3::new(1.0, 1.0, camera.pixels_per_meter()));
        self.inverse_mercator_matrix = invert(&self.mercator_matrix, "mercator")?;
        self.frustum = Frustum::from_view_projection(&self.mercator_matrix);
        Ok(())
    }

    fn projection_data(&self, tile: UnwrappedTileId, override_matrix: Option<&DMat4>) -> ProjectionData {
        let matrix = match override_matrix {
            Some(m) => *m,
            None => self.tile_matrix(tile),
        };
        let matrix = to_gpu_matrix(&matrix);
        ProjectionData {
            main_matrix: matrix,
            fallback_matrix: matrix,
            tile_mercator_coords: tile_mercator_coords(tile),
            clipping_plane: [0.0; 4],
            projection_transition: 0.0,
        }
    }

    fn project_tile_coordinates(
        &self,
        x: f64,
        y: f64,
        tile: UnwrappedTileId,
        elevation: Option<&ElevationFn<'_>>,
    ) -> PointProjection {
        let z = elevation.map_or(0.0, |f| f(x, y));
        let clip = self.tile_matrix(tile) * DVec4::new(x, y, z, 1.0);
        PointProjection {
            point: DVec2::new(clip.x, clip.y) / clip.w,
            signed_distance_from_camera: clip.w,
            is_occluded: false,
        }
    }

    fn is_occluded(&self, _x: f64, _y: f64, _tile: UnwrappedTileId) -> bool {
        false
    }

    fn pixel_scale(&self) -> f64 {
        1.0
    }

    fn is_rendering_dirty(&self) -> bool {
        false
    }

    fn unproject_screen_point(&self, screen: DVec2) -> Option<LngLat> {
        let ndc = screen_to_ndc(&self.camera, screen);
        let near = self.inverse_mercator_matrix.project_point3(DVec3::new(ndc.x, ndc.y, -1.0));
        let far = self.inverse_mercator_matrix.project_point3(DVec3::new(ndc.x, ndc.y, 1.0));
        let dz = far.z - near.z;
        if dz == 0.0 {
            return None;
        }
        let t = -near.z / dz;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        let hit = near.lerp(far, t);
        Some(LngLat::new(
            lng_from_mercator_x(hit.x),
            lat_from_mercator_y(hit.y),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::camera::CameraConstraints;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn projection(lng: f64, lat: f64, zoom: f64, pitch: f64, bearing: f64) -> FlatProjection {
        let mut camera = CameraState::new(CameraConstraints::default(), 800.0, 600.0);
        camera.set_center(LngLat::new(lng, lat));
        camera.set_zoom(zoom);
        camera.set_pitch(pitch);
        camera.set_bearing(bearing);
        let mut flat = FlatProjection::new(&camera);
        flat.update_projection(&camera, Frame::new(0, 1.0 / 60.0)).unwrap();
        flat
    }

    #[test]
    fn center_projects_to_screen_center() {
        let flat = projection(0.0, 0.0, 1.0, 0.0, 0.0);
        // Zoom 1: the world is 2x2 tiles and the center is the shared corner.
        let p = flat.project_tile_coordinates(
            0.0,
            0.0,
            UnwrappedTileId::new(0, TileCoord::new(1, 1, 1)),
            None,
        );
        assert_close(p.point.x, 0.0, 1e-9);
        assert_close(p.point.y, 0.0, 1e-9);
        assert_close(p.signed_distance_from_camera, 900.0, 1e-6);
        assert!(!p.is_occluded);
    }

    #[test]
    fn east_is_right_and_north_is_up() {
        let flat = projection(0.0, 0.0, 1.0, 0.0, 0.0);
        let tile = UnwrappedTileId::new(0, TileCoord::new(1, 1, 1));
        let east = flat.project_tile_coordinates(EXTENT / 4.0, 0.0, tile, None);
        assert!(east.point.x > 0.0);
        assert_close(east.point.y, 0.0, 1e-9);
        // 128 px right of center on an 800 px viewport.
        assert_close(east.point.x, 128.0 / 400.0, 1e-9);

        let north = UnwrappedTileId::new(0, TileCoord::new(1, 1, 0));
        let up = flat.project_tile_coordinates(0.0, EXTENT * 0.75, north, None);
        assert!(up.point.y > 0.0);
    }

    #[test]
    fn bearing_rotates_east_to_the_top() {
        let flat = projection(0.0, 0.0, 1.0, 0.0, 90.0);
        let tile = UnwrappedTileId::new(0, TileCoord::new(1, 1, 1));
        let east = flat.project_tile_coordinates(EXTENT / 4.0, 0.0, tile, None);
        assert_close(east.point.x, 0.0, 1e-9);
        assert!(east.point.y > 0.0);
    }

    #[test]
    fn pitch_pushes_north_further_away() {
        let flat = projection(0.0, 0.0, 3.0, 60.0, 0.0);
        let north = UnwrappedTileId::new(0, TileCoord::new(3, 4, 3));
        let south = UnwrappedTileId::new(0, TileCoord::new(3, 4, 4));
        let n = flat.project_tile_coordinates(0.0, EXTENT * 0.5, north, None);
        let s = flat.project_tile_coordinates(0.0, EXTENT * 0.5, south, None);
        assert!(n.signed_distance_from_camera > s.signed_distance_from_camera);
    }

    #[test]
    fn elevation_lifts_points_towards_the_camera() {
        let flat = projection(0.0, 0.0, 10.0, 0.0, 0.0);
        let tile = UnwrappedTileId::new(0, TileCoord::new(10, 512, 512));
        let ground = flat.project_tile_coordinates(0.0, 0.0, tile, None);
        let lift = |_x: f64, _y: f64| 1000.0;
        let raised = flat.project_tile_coordinates(0.0, 0.0, tile, Some(&lift));
        assert!(raised.signed_distance_from_camera < ground.signed_distance_from_camera);
    }

    #[test]
    fn projection_data_is_flat() {
        let flat = projection(10.0, 20.0, 4.0, 30.0, 15.0);
        let tile = UnwrappedTileId::new(0, TileCoord::new(4, 8, 6));
        let data = flat.projection_data(tile, None);
        assert_eq!(data.main_matrix, data.fallback_matrix);
        assert_eq!(data.clipping_plane, [0.0; 4]);
        assert_eq!(data.projection_transition, 0.0);
        assert_eq!(data.tile_mercator_coords[0], 0.5);

        let custom = DMat4::from_scale(DVec3::splat(2.0));
        let overridden = flat.projection_data(tile, Some(&custom));
        assert_eq!(overridden.main_matrix, to_gpu_matrix(&custom));
        assert_eq!(flat.pixel_scale(), 1.0);
        assert!(!flat.is_rendering_dirty());
        assert!(!flat.is_occluded(0.0, 0.0, tile));
    }

    #[test]
    fn world_copies_shift_by_one_world() {
        let flat = projection(0.0, 0.0, 2.0, 0.0, 0.0);
        let canonical = TileCoord::new(2, 1, 1);
        let a = flat.project_tile_coordinates(0.0, 0.0, UnwrappedTileId::new(0, canonical), None);
        let b = flat.project_tile_coordinates(0.0, 0.0, UnwrappedTileId::new(1, canonical), None);
        // 2048 px world on an 800 px viewport.
        assert_close(b.point.x - a.point.x, 2048.0 / 400.0, 1e-9);
    }

    #[test]
    fn visibility_of_tiles() {
        // 2048 px world: a z4 tile is 128 px.
        let flat = projection(0.0, 0.0, 2.0, 0.0, 0.0);
        assert_eq!(
            flat.tile_visibility(TileCoord::new(4, 8, 8), 0, None),
            IntersectionResult::Full
        );
        assert_eq!(
            flat.tile_visibility(TileCoord::new(0, 0, 0), 0, None),
            IntersectionResult::Partial
        );
        assert_eq!(
            flat.tile_visibility(TileCoord::new(4, 0, 0), 0, None),
            IntersectionResult::None
        );
        assert_eq!(
            flat.tile_visibility(TileCoord::new(4, 8, 8), 0, Some((0.0, 100.0))),
            IntersectionResult::Full
        );
    }

    #[test]
    fn unprojecting_the_center_returns_the_center() {
        let flat = projection(13.4, 52.5, 9.0, 45.0, 30.0);
        let center = flat.unproject_screen_point(DVec2::new(400.0, 300.0)).unwrap();
        assert_close(center.lng, 13.4, 1e-6);
        assert_close(center.lat, 52.5, 1e-6);
    }

    #[test]
    fn far_plane_grows_with_pitch() {
        let mut camera = CameraState::new(CameraConstraints::default(), 800.0, 600.0);
        let flat_far = far_plane_distance(&camera);
        camera.set_pitch(60.0);
        assert!(far_plane_distance(&camera) > flat_far);
        // Looking straight down the far plane sits just past the ground.
        assert_close(flat_far, camera.camera_to_center_distance() * 1.01, 1e-6);
    }
}
