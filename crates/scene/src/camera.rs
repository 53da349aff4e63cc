//! Per-frame camera snapshot.
//!
//! `CameraState` is mutated only through its setters, which clamp every input
//! against the configured [`CameraConstraints`]. Everything else in the engine
//! reads it as an immutable snapshot for the duration of a frame.

use foundation::math::{
    DVec2, MAX_VALID_LATITUDE, MercatorCoordinate, mercator_z_from_altitude, wrap, zoom_scale,
};
use serde::{Deserialize, Serialize};

/// Largest pitch any configuration may request (degrees).
pub const PITCH_LIMIT_DEG: f64 = 85.0;

pub const DEFAULT_FOV_DEG: f64 = 36.869_897_645_844_02;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConstraints {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub min_pitch: f64,
    pub max_pitch: f64,
    /// Size of a rendered tile in screen pixels.
    pub tile_size: u32,
    pub render_world_copies: bool,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            min_zoom: 0.0,
            max_zoom: 22.0,
            min_pitch: 0.0,
            max_pitch: 60.0,
            tile_size: 512,
            render_world_copies: true,
        }
    }
}

impl CameraConstraints {
    /// Reorders reversed bounds and clamps pitch into the supported range.
    pub fn normalized(self) -> Self {
        let (min_zoom, max_zoom) = ordered(self.min_zoom.max(0.0), self.max_zoom.max(0.0));
        let (min_pitch, max_pitch) = ordered(
            self.min_pitch.clamp(0.0, PITCH_LIMIT_DEG),
            self.max_pitch.clamp(0.0, PITCH_LIMIT_DEG),
        );
        Self {
            min_zoom,
            max_zoom,
            min_pitch,
            max_pitch,
            tile_size: self.tile_size.max(1),
            render_world_copies: self.render_world_copies,
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Geographic position in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    /// Latitude is clamped to `[-90, 90]`.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat: lat.clamp(-90.0, 90.0),
        }
    }

    /// Longitude wrapped into `[-180, 180)`.
    pub fn wrapped(self) -> Self {
        Self {
            lng: wrap(self.lng, -180.0, 180.0),
            lat: self.lat,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    constraints: CameraConstraints,
    center: LngLat,
    zoom: f64,
    pitch_deg: f64,
    bearing_deg: f64,
    fov_deg: f64,
    width: f64,
    height: f64,
    elevation_m: f64,
}

impl CameraState {
    pub fn new(constraints: CameraConstraints, width: f64, height: f64) -> Self {
        let constraints = constraints.normalized();
        let mut camera = Self {
            constraints,
            center: LngLat::new(0.0, 0.0),
            zoom: constraints.min_zoom,
            pitch_deg: constraints.min_pitch,
            bearing_deg: 0.0,
            fov_deg: DEFAULT_FOV_DEG,
            width: 1.0,
            height: 1.0,
            elevation_m: 0.0,
        };
        camera.resize(width, height);
        camera
    }

    pub fn constraints(&self) -> &CameraConstraints {
        &self.constraints
    }

    /// Replaces the constraints and re-clamps the current state.
    pub fn set_constraints(&mut self, constraints: CameraConstraints) {
        self.constraints = constraints.normalized();
        self.set_zoom(self.zoom);
        self.set_pitch(self.pitch_deg);
    }

    pub fn center(&self) -> LngLat {
        self.center
    }

    /// Latitude is clamped to the Mercator range.
    pub fn set_center(&mut self, center: LngLat) {
        self.center = LngLat {
            lng: center.lng,
            lat: center.lat.clamp(-MAX_VALID_LATITUDE, MAX_VALID_LATITUDE),
        }
        .wrapped();
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.constraints.min_zoom, self.constraints.max_zoom);
    }

    pub fn pitch_deg(&self) -> f64 {
        self.pitch_deg
    }

    pub fn set_pitch(&mut self, pitch_deg: f64) {
        self.pitch_deg = pitch_deg.clamp(self.constraints.min_pitch, self.constraints.max_pitch);
    }

    pub fn bearing_deg(&self) -> f64 {
        self.bearing_deg
    }

    /// Bearing is wrapped into `[-180, 180)`.
    pub fn set_bearing(&mut self, bearing_deg: f64) {
        self.bearing_deg = wrap(bearing_deg, -180.0, 180.0);
        if self.bearing_deg == 180.0 {
            self.bearing_deg = -180.0;
        }
    }

    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    pub fn set_fov(&mut self, fov_deg: f64) {
        self.fov_deg = fov_deg.clamp(0.01, 60.0);
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    pub fn elevation_m(&self) -> f64 {
        self.elevation_m
    }

    pub fn set_elevation(&mut self, elevation_m: f64) {
        self.elevation_m = elevation_m;
    }

    pub fn tile_size(&self) -> f64 {
        self.constraints.tile_size as f64
    }

    pub fn render_world_copies(&self) -> bool {
        self.constraints.render_world_copies
    }

    pub fn pitch_rad(&self) -> f64 {
        self.pitch_deg.to_radians()
    }

    pub fn bearing_rad(&self) -> f64 {
        self.bearing_deg.to_radians()
    }

    pub fn fov_rad(&self) -> f64 {
        self.fov_deg.to_radians()
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    pub fn scale(&self) -> f64 {
        zoom_scale(self.zoom)
    }

    /// Size of the whole world in pixels at the current zoom.
    pub fn world_size(&self) -> f64 {
        self.tile_size() * self.scale()
    }

    pub fn camera_to_center_distance(&self) -> f64 {
        0.5 / (self.fov_rad() * 0.5).tan() * self.height
    }

    pub fn center_mercator(&self) -> MercatorCoordinate {
        MercatorCoordinate::from_lng_lat(self.center.lng, self.center.lat, self.elevation_m)
    }

    /// Center in world pixels.
    pub fn center_point(&self) -> DVec2 {
        let c = self.center_mercator();
        DVec2::new(c.x, c.y) * self.world_size()
    }

    pub fn pixels_per_meter(&self) -> f64 {
        mercator_z_from_altitude(1.0, self.center.lat) * self.world_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn setters_clamp_to_constraints() {
        let mut cam = CameraState::new(CameraConstraints::default(), 800.0, 600.0);
        cam.set_zoom(40.0);
        assert_eq!(cam.zoom(), 22.0);
        cam.set_zoom(-3.0);
        assert_eq!(cam.zoom(), 0.0);
        cam.set_pitch(80.0);
        assert_eq!(cam.pitch_deg(), 60.0);
        cam.set_center(LngLat::new(10.0, 89.0));
        assert_eq!(cam.center().lat, MAX_VALID_LATITUDE);
    }

    #[test]
    fn lng_lat_clamps_latitude() {
        assert_eq!(LngLat::new(0.0, 120.0).lat, 90.0);
        assert_eq!(LngLat::new(0.0, -95.0).lat, -90.0);
    }

    #[test]
    fn center_longitude_and_bearing_wrap() {
        let mut cam = CameraState::new(CameraConstraints::default(), 100.0, 100.0);
        cam.set_center(LngLat::new(190.0, 0.0));
        assert_close(cam.center().lng, -170.0, 1e-12);
        cam.set_bearing(270.0);
        assert_close(cam.bearing_deg(), -90.0, 1e-12);
        cam.set_bearing(180.0);
        assert_eq!(cam.bearing_deg(), -180.0);
    }

    #[test]
    fn reversed_constraints_are_reordered() {
        let c = CameraConstraints {
            min_zoom: 10.0,
            max_zoom: 2.0,
            min_pitch: 70.0,
            max_pitch: 100.0,
            ..CameraConstraints::default()
        }
        .normalized();
        assert_eq!((c.min_zoom, c.max_zoom), (2.0, 10.0));
        assert_eq!((c.min_pitch, c.max_pitch), (70.0, PITCH_LIMIT_DEG));
    }

    #[test]
    fn derived_quantities() {
        let mut cam = CameraState::new(CameraConstraints::default(), 1024.0, 768.0);
        cam.set_zoom(2.0);
        assert_eq!(cam.world_size(), 2048.0);
        assert_eq!(cam.center_point(), DVec2::new(1024.0, 1024.0));
        let expected = 0.5 / (DEFAULT_FOV_DEG.to_radians() * 0.5).tan() * 768.0;
        assert_close(cam.camera_to_center_distance(), expected, 1e-9);
        // fov ~36.87 deg puts the camera 1.5 viewport heights away.
        assert_close(cam.camera_to_center_distance(), 1.5 * 768.0, 1e-6);
    }

    #[test]
    fn constraints_deserialize_with_defaults() {
        let c: CameraConstraints = serde_json::from_str(r#"{"max_zoom": 14}"#).unwrap();
        assert_eq!(c.max_zoom, 14.0);
        assert_eq!(c.tile_size, 512);
        assert!(c.render_world_copies);
    }
}
