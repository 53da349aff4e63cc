//! The globe, blended with the flat map by `globeness`.
//!
//! Two sphere matrices are built each frame. The accurate one folds in the
//! measured GPU latitude error and is only ever uploaded; the uncorrected one
//! is exact and backs every CPU query (projection, unprojection, culling) so
//! that those stay consistent with each other.

use std::sync::Arc;

use foundation::math::{DMat4, DVec2, DVec3, DVec4, EARTH_RADIUS_M, to_gpu_matrix};
use foundation::time::Time;
use gpu::mesh::{TileMesh, TileMeshCache, TileMeshKey, granularity_for_zoom};
use gpu::readback::MeasurementDevice;
use runtime::frame::Frame;
use runtime::transition::{Transition, ease_cubic_in_out};
use scene::camera::{CameraState, LngLat};
use scene::visibility::{Frustum, IntersectionResult, Plane};
use streaming::coverage::{CoverageView, flat_distance_to_tile};
use streaming::tile::{TileCoord, UnwrappedTileId};
use tracing::debug;

use crate::clipping::{
    camera_position_on_unit_sphere, clipping_plane, globe_radius_pixels,
    project_tile_coordinates_to_sphere, tile_sphere_bounds,
};
use crate::error_correction::ErrorCorrectionLoop;
use crate::flat::FlatProjection;
use crate::model::{
    ElevationFn, PointProjection, ProjectionData, ProjectionError, ProjectionModel,
    ProjectionOptions, invert, screen_to_ndc,
};

/// Duration of the globe enable/disable animation.
pub const GLOBE_TRANSITION_S: f64 = 0.5;
/// Duration of the automatic flattening at high zoom.
pub const ZOOM_TRANSITION_S: f64 = 0.5;
/// From this zoom on the globe is drawn flat.
pub const GLOBE_FLATTEN_ZOOM: f64 = 12.0;
/// Extra time rendering stays dirty after an animation ends.
pub const DIRTY_GRACE_S: f64 = 0.2;

const GLOBE_NEAR_PLANE: f64 = 0.5;

#[derive(Debug)]
pub struct SphericalProjection {
    flat: FlatProjection,
    options: ProjectionOptions,
    skip_next_animation: bool,
    globe_toggle: Transition,
    zoom_flatten: Transition,
    globeness: f64,
    now: Time,
    radius_px: f64,
    globe_matrix: DMat4,
    uncorrected_matrix: DMat4,
    inverse_uncorrected_matrix: DMat4,
    frustum: Frustum,
    clipping_plane: Plane,
    error_loop: ErrorCorrectionLoop,
    meshes: TileMeshCache,
}

impl SphericalProjection {
    /// The first update jumps straight to the configured state.
    pub fn new(
        camera: &CameraState,
        options: ProjectionOptions,
        device: Box<dyn MeasurementDevice>,
    ) -> Self {
        Self {
            flat: FlatProjection::new(camera),
            options,
            skip_next_animation: true,
            globe_toggle: Transition::settled(0.0, GLOBE_TRANSITION_S),
            zoom_flatten: Transition::settled(1.0, ZOOM_TRANSITION_S),
            globeness: 0.0,
            now: Time::ZERO,
            radius_px: 1.0,
            globe_matrix: DMat4::IDENTITY,
            uncorrected_matrix: DMat4::IDENTITY,
            inverse_uncorrected_matrix: DMat4::IDENTITY,
            frustum: Frustum::from_view_projection(&DMat4::IDENTITY),
            clipping_plane: Plane::new(DVec3::ZERO, 0.0),
            error_loop: ErrorCorrectionLoop::new(device),
            meshes: TileMeshCache::new(),
        }
    }

    pub fn options(&self) -> ProjectionOptions {
        self.options
    }

    /// 0 is flat, 1 is a full sphere.
    pub fn globeness(&self) -> f64 {
        self.globeness
    }

    pub fn globe_radius_pixels(&self) -> f64 {
        self.radius_px
    }

    /// Matrix uploaded for rendering, including the measured correction.
    pub fn globe_matrix(&self) -> &DMat4 {
        &self.globe_matrix
    }

    /// Exact matrix used for CPU-side queries.
    pub fn uncorrected_globe_matrix(&self) -> &DMat4 {
        &self.uncorrected_matrix
    }

    pub fn clipping_plane(&self) -> Plane {
        self.clipping_plane
    }

    pub fn latitude_correction(&self) -> f64 {
        self.error_loop.correction()
    }

    pub fn camera_position(&self) -> DVec3 {
        camera_position_on_unit_sphere(self.flat.camera(), self.radius_px)
    }

    pub fn flat(&self) -> &FlatProjection {
        &self.flat
    }

    fn is_globe_rendering(&self) -> bool {
        self.globeness > 0.0
    }

    /// Shared mesh for drawing `tile` on the sphere.
    pub fn tile_mesh(&mut self, tile: TileCoord, has_border: bool) -> Arc<TileMesh> {
        self.meshes.get_or_build(TileMeshKey {
            granularity: granularity_for_zoom(tile.z),
            has_border,
            has_north_pole: tile.touches_north_pole(),
            has_south_pole: tile.touches_south_pole(),
        })
    }

    pub fn cached_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Drops everything that lived on the lost rendering context.
    pub fn on_context_lost(&mut self) {
        debug!(meshes = self.meshes.len(), "rendering context lost");
        self.meshes.clear();
    }

    fn build_globe_matrix(camera: &CameraState, radius_px: f64, lat_correction: f64) -> DMat4 {
        let ccd = camera.camera_to_center_distance();
        let center = camera.center();
        DMat4::perspective_rh_gl(
            camera.fov_rad(),
            camera.aspect(),
            GLOBE_NEAR_PLANE,
            ccd + 2.0 * radius_px,
        ) * DMat4::from_translation(DVec3::new(0.0, 0.0, -ccd))
            * DMat4::from_rotation_x(-camera.pitch_rad())
            * DMat4::from_rotation_z(camera.bearing_rad())
            * DMat4::from_translation(DVec3::new(0.0, 0.0, -radius_px))
            * DMat4::from_rotation_x(center.lat.to_radians() - lat_correction)
            * DMat4::from_rotation_y(-center.lng.to_radians())
            * DMat4::from_scale(DVec3::splat(radius_px))
    }

    fn update_globeness(&mut self, camera: &CameraState) {
        let animate = self.options.animate_transition && !self.skip_next_animation;
        self.skip_next_animation = false;
        let globe_target = if self.options.globe_enabled { 1.0 } else { 0.0 };
        let zoom_target = if camera.zoom() >= GLOBE_FLATTEN_ZOOM { 0.0 } else { 1.0 };
        for (transition, target) in [
            (&mut self.globe_toggle, globe_target),
            (&mut self.zoom_flatten, zoom_target),
        ] {
            if animate {
                transition.retarget(target, self.now);
            } else {
                transition.jump_to(target);
            }
        }
        let linear = self
            .globe_toggle
            .linear(self.now)
            .min(self.zoom_flatten.linear(self.now));
        self.globeness = ease_cubic_in_out(linear).clamp(0.0, 1.0);
    }
}

impl CoverageView for SphericalProjection {
    fn camera(&self) -> &CameraState {
        self.flat.camera()
    }

    fn tile_visibility(
        &self,
        tile: TileCoord,
        wrap: i32,
        elevation: Option<(f64, f64)>,
    ) -> IntersectionResult {
        if !self.is_globe_rendering() {
            return self.flat.tile_visibility(tile, wrap, elevation);
        }
        let bounds = tile_sphere_bounds(tile);
        self.frustum
            .intersect_aabb(&bounds)
            .and(self.clipping_plane.intersect_aabb(&bounds))
    }

    fn distance_to_tile(&self, focus: DVec2, tile: TileCoord, wrap: i32) -> f64 {
        if !self.is_globe_rendering() {
            return flat_distance_to_tile(focus, tile, wrap);
        }
        (-1..=1)
            .map(|w| flat_distance_to_tile(focus, tile, w))
            .fold(f64::INFINITY, f64::min)
    }

    fn leaf_wrap(&self, focus: DVec2, tile: TileCoord, parent_wrap: i32) -> i32 {
        if !self.is_globe_rendering() {
            return parent_wrap;
        }
        let mut best = (0, flat_distance_to_tile(focus, tile, 0));
        for w in [-1, 1] {
            let d = flat_distance_to_tile(focus, tile, w);
            if d < best.1 {
                best = (w, d);
            }
        }
        best.0
    }

    fn allow_world_copies(&self) -> bool {
        !self.is_globe_rendering() && self.flat.allow_world_copies()
    }
}

impl ProjectionModel for SphericalProjection {
    fn name(&self) -> &'static str {
        "globe"
    }

    fn update_projection(&mut self, camera: &CameraState, frame: Frame) -> Result<(), ProjectionError> {
        self.flat.update_projection(camera, frame)?;
        self.now = frame.time;
        self.update_globeness(camera);

        let center = camera.center();
        self.radius_px = globe_radius_pixels(camera.world_size(), center.lat);
        let correction = if self.is_globe_rendering() {
            self.error_loop
                .update(frame, camera.center_mercator().y, center.lat.to_radians())
        } else {
            self.error_loop.correction()
        };

        self.uncorrected_matrix = Self::build_globe_matrix(camera, self.radius_px, 0.0);
        self.globe_matrix = Self::build_globe_matrix(camera, self.radius_px, correction);
        self.inverse_uncorrected_matrix = invert(&self.uncorrected_matrix, "globe")?;
        self.frustum = Frustum::from_view_projection(&self.uncorrected_matrix);
        self.clipping_plane = clipping_plane(camera, self.radius_px);
        Ok(())
    }

    fn projection_data(&self, tile: UnwrappedTileId, override_matrix: Option<&DMat4>) -> ProjectionData {
        let flat = self.flat.projection_data(tile, override_matrix);
        if !self.is_globe_rendering() {
            return flat;
        }
        let plane = self.clipping_plane;
        ProjectionData {
            main_matrix: to_gpu_matrix(&self.globe_matrix),
            fallback_matrix: flat.main_matrix,
            tile_mercator_coords: flat.tile_mercator_coords,
            clipping_plane: [
                plane.n.x as f32,
                plane.n.y as f32,
                plane.n.z as f32,
                plane.d as f32,
            ],
            projection_transition: self.globeness as f32,
        }
    }

    fn project_tile_coordinates(
        &self,
        x: f64,
        y: f64,
        tile: UnwrappedTileId,
        elevation: Option<&ElevationFn<'_>>,
    ) -> PointProjection {
        if !self.is_globe_rendering() {
            return self.flat.project_tile_coordinates(x, y, tile, elevation);
        }
        let on_sphere = project_tile_coordinates_to_sphere(x, y, tile.canonical);
        let lift = 1.0 + elevation.map_or(0.0, |f| f(x, y)) / EARTH_RADIUS_M;
        let clip = self.uncorrected_matrix * (on_sphere * lift).extend(1.0);
        PointProjection {
            point: DVec2::new(clip.x, clip.y) / clip.w,
            signed_distance_from_camera: clip.w,
            is_occluded: self.clipping_plane.distance(on_sphere) < 0.0,
        }
    }

    fn is_occluded(&self, x: f64, y: f64, tile: UnwrappedTileId) -> bool {
        if !self.is_globe_rendering() {
            return false;
        }
        let on_sphere = project_tile_coordinates_to_sphere(x, y, tile.canonical);
        self.clipping_plane.distance(on_sphere) < 0.0
    }

    fn pixel_scale(&self) -> f64 {
        let globe_scale = 1.0 / self.camera().center().lat.to_radians().cos();
        1.0 + (globe_scale - 1.0) * self.globeness
    }

    fn is_rendering_dirty(&self) -> bool {
        self.globe_toggle.is_settling(self.now, DIRTY_GRACE_S)
            || self.zoom_flatten.is_settling(self.now, DIRTY_GRACE_S)
            || (self.is_globe_rendering() && self.error_loop.is_dirty(DIRTY_GRACE_S))
    }

    fn set_globe_enabled(&mut self, enabled: bool) {
        self.options.globe_enabled = enabled;
    }

    fn skip_next_animation(&mut self) {
        self.skip_next_animation = true;
    }

    fn unproject_screen_point(&self, screen: DVec2) -> Option<LngLat> {
        if !self.is_globe_rendering() {
            return self.flat.unproject_screen_point(screen);
        }
        let ndc = screen_to_ndc(self.camera(), screen);
        let unproject = |z: f64| {
            let p = self.inverse_uncorrected_matrix * DVec4::new(ndc.x, ndc.y, z, 1.0);
            p.truncate() / p.w
        };
        let origin = unproject(-1.0);
        let dir = (unproject(1.0) - origin).normalize();
        // |origin + t * dir| = 1
        let b = origin.dot(dir);
        let c = origin.length_squared() - 1.0;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let t = -b - disc.sqrt();
        if t < 0.0 {
            return None;
        }
        let hit = origin + dir * t;
        Some(LngLat::new(
            hit.x.atan2(hit.z).to_degrees(),
            hit.y.clamp(-1.0, 1.0).asin().to_degrees(),
        ))
    }
}
