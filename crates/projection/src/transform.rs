use foundation::math::DVec2;
use gpu::readback::{CpuMeasurementDevice, MeasurementDevice};
use runtime::frame::Frame;
use scene::camera::{CameraState, LngLat};
use streaming::coverage::{CoveredTile, CoveringTilesOptions, ElevationProvider, covering_tiles};
use streaming::tile::UnwrappedTileId;

use crate::flat::FlatProjection;
use crate::model::{ProjectionData, ProjectionError, ProjectionModel, ProjectionOptions};
use crate::spherical::SphericalProjection;

/// A camera together with the projection model chosen for the map.
pub struct MapTransform {
    camera: CameraState,
    projection: Box<dyn ProjectionModel>,
}

impl MapTransform {
    pub fn new(camera: CameraState, projection: Box<dyn ProjectionModel>) -> Self {
        Self { camera, projection }
    }

    pub fn flat(camera: CameraState) -> Self {
        let projection = Box::new(FlatProjection::new(&camera));
        Self::new(camera, projection)
    }

    pub fn spherical(
        camera: CameraState,
        options: ProjectionOptions,
        device: Box<dyn MeasurementDevice>,
    ) -> Self {
        let projection = Box::new(SphericalProjection::new(&camera, options, device));
        Self::new(camera, projection)
    }

    /// Spherical model measured on the CPU. It draws flat until the globe is
    /// enabled, so the toggle stays available either way.
    pub fn from_options(camera: CameraState, options: ProjectionOptions) -> Self {
        Self::spherical(camera, options, Box::new(CpuMeasurementDevice::new()))
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Changes apply on the next [`MapTransform::update`].
    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    pub fn projection(&self) -> &dyn ProjectionModel {
        self.projection.as_ref()
    }

    /// Animates towards the new state from the next update.
    pub fn set_globe_enabled(&mut self, enabled: bool) {
        self.projection.set_globe_enabled(enabled);
    }

    pub fn skip_next_animation(&mut self) {
        self.projection.skip_next_animation();
    }

    /// Recomputes the projection for this frame. Call before any query.
    pub fn update(&mut self, frame: Frame) -> Result<(), ProjectionError> {
        self.projection.update_projection(&self.camera, frame)
    }

    pub fn covering_tiles(
        &self,
        options: &CoveringTilesOptions,
        elevation: Option<&dyn ElevationProvider>,
    ) -> Vec<CoveredTile> {
        covering_tiles(self.projection.as_ref(), options, elevation)
    }

    pub fn projection_data(&self, tile: UnwrappedTileId) -> ProjectionData {
        self.projection.projection_data(tile, None)
    }

    pub fn unproject(&self, screen: DVec2) -> Option<LngLat> {
        self.projection.unproject_screen_point(screen)
    }

    pub fn is_rendering_dirty(&self) -> bool {
        self.projection.is_rendering_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scene::camera::CameraConstraints;
    use streaming::tile::TileCoord;

    fn camera() -> CameraState {
        let mut cam = CameraState::new(CameraConstraints::default(), 800.0, 600.0);
        cam.set_center(LngLat::new(-0.12, 51.5));
        cam.set_zoom(10.0);
        cam
    }

    fn london() -> UnwrappedTileId {
        UnwrappedTileId::new(0, TileCoord::new(10, 511, 340))
    }

    #[test]
    fn globe_can_be_enabled_after_starting_flat() {
        let mut transform = MapTransform::from_options(camera(), ProjectionOptions::default());
        let mut frame = Frame::new(0, 1.0 / 60.0);
        transform.update(frame).unwrap();
        assert_eq!(transform.projection_data(london()).projection_transition, 0.0);
        assert!(!transform.is_rendering_dirty());

        transform.set_globe_enabled(true);
        frame = frame.next();
        transform.update(frame).unwrap();
        assert!(transform.is_rendering_dirty());
        let mut last = transform.projection_data(london()).projection_transition;
        assert!(last < 1.0);
        for _ in 0..40 {
            frame = frame.next();
            transform.update(frame).unwrap();
            let t = transform.projection_data(london()).projection_transition;
            assert!(t >= last, "transition went back from {last} to {t}");
            last = t;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn skipping_the_animation_disables_at_once() {
        let options = ProjectionOptions {
            globe_enabled: true,
            ..ProjectionOptions::default()
        };
        let mut transform = MapTransform::from_options(camera(), options);
        transform.update(Frame::new(0, 1.0 / 60.0)).unwrap();
        assert_eq!(transform.projection_data(london()).projection_transition, 1.0);

        transform.set_globe_enabled(false);
        transform.skip_next_animation();
        transform.update(Frame::new(1, 1.0 / 60.0)).unwrap();
        assert_eq!(transform.projection_data(london()).projection_transition, 0.0);
    }

    #[test]
    fn flat_model_ignores_the_globe_toggle() {
        let mut transform = MapTransform::flat(camera());
        transform.set_globe_enabled(true);
        transform.update(Frame::new(0, 1.0 / 60.0)).unwrap();
        assert_eq!(transform.projection().name(), "mercator");
        assert_eq!(transform.projection_data(london()).projection_transition, 0.0);
        assert!(!transform.is_rendering_dirty());
    }

    #[test]
    fn camera_changes_apply_on_update() {
        let mut transform = MapTransform::flat(camera());
        transform.update(Frame::new(0, 1.0 / 60.0)).unwrap();
        transform.camera_mut().set_center(LngLat::new(2.35, 48.85));
        let stale = transform.unproject(DVec2::new(400.0, 300.0)).unwrap();
        assert!((stale.lng + 0.12).abs() < 1e-6);
        transform.update(Frame::new(1, 1.0 / 60.0)).unwrap();
        let fresh = transform.unproject(DVec2::new(400.0, 300.0)).unwrap();
        assert!((fresh.lng - 2.35).abs() < 1e-6);
    }

    #[test]
    fn flat_and_globe_cover_alike_when_flattened() {
        let mut cam = camera();
        cam.set_zoom(13.0);
        let mut flat = MapTransform::flat(cam.clone());
        let mut globe = MapTransform::from_options(
            cam,
            ProjectionOptions {
                globe_enabled: true,
                ..ProjectionOptions::default()
            },
        );
        flat.update(Frame::new(0, 1.0 / 60.0)).unwrap();
        globe.update(Frame::new(0, 1.0 / 60.0)).unwrap();
        let options = CoveringTilesOptions::default();
        assert_eq!(
            flat.covering_tiles(&options, None),
            globe.covering_tiles(&options, None)
        );
        assert!(!globe.is_rendering_dirty());
    }
}
