//! Sphere geometry: globe radius, camera position and the plane separating
//! the visible hemisphere cap from the far side.
//!
//! All positions are on the unit sphere with +Y north, +Z towards
//! (lng 0, lat 0) and +X towards (lng 90, lat 0).

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use foundation::bounds::Aabb3;
use foundation::math::{DVec3, EXTENT, rotate_x, rotate_y, rotate_z};
use scene::camera::CameraState;
use scene::visibility::Plane;
use streaming::tile::TileCoord;

/// Plane coefficients are scaled by this before upload.
pub const CLIPPING_PLANE_SCALE: f64 = 0.25;

/// Radius of the globe in pixels such that scale at `lat_deg` matches the flat map.
pub fn globe_radius_pixels(world_size: f64, lat_deg: f64) -> f64 {
    world_size / TAU / lat_deg.to_radians().cos()
}

/// Camera position in unit-sphere coordinates.
pub fn camera_position_on_unit_sphere(camera: &CameraState, radius_px: f64) -> DVec3 {
    let center = camera.center();
    let distance = camera.camera_to_center_distance() / radius_px;
    let mut pos = DVec3::new(0.0, 0.0, distance);
    pos = rotate_x(pos, camera.pitch_rad());
    pos = rotate_z(pos, -camera.bearing_rad());
    pos += DVec3::Z;
    pos = rotate_x(pos, -center.lat.to_radians());
    rotate_y(pos, center.lng.to_radians())
}

/// The horizon plane for the camera: points with `distance >= 0` face it.
///
/// The camera sits at distance `d` (in radii) from the surface point under
/// the map center, pitched by `p`. Its tangent points to the sphere lie on a
/// plane at `1 / |camera|` from the sphere center, normal to the camera
/// direction.
pub fn clipping_plane(camera: &CameraState, radius_px: f64) -> Plane {
    let center = camera.center();
    let pitch = camera.pitch_rad();
    let d = camera.camera_to_center_distance() / radius_px;
    let a = pitch.sin() * d;
    let a_to_c = pitch.cos() * d + 1.0;
    let dist = a.hypot(a_to_c);
    let tangent_plane_distance = 1.0 / dist;

    let mut normal = DVec3::new(0.0, -a, a_to_c).normalize();
    normal = rotate_z(normal, -camera.bearing_rad());
    normal = rotate_x(normal, -center.lat.to_radians());
    normal = rotate_y(normal, center.lng.to_radians());

    Plane::new(
        normal * CLIPPING_PLANE_SCALE,
        -tangent_plane_distance * CLIPPING_PLANE_SCALE,
    )
}

/// Unit-sphere position of tile-local coordinates.
pub fn project_tile_coordinates_to_sphere(x: f64, y: f64, tile: TileCoord) -> DVec3 {
    let scale = tile.mercator_size();
    let merc_x = (x / EXTENT + tile.x as f64) * scale;
    let merc_y = (y / EXTENT + tile.y as f64) * scale;
    let lng = (merc_x * TAU + PI).rem_euclid(TAU);
    let lat = 2.0 * (PI - merc_y * TAU).exp().atan() - FRAC_PI_2;
    sphere_point(lng, lat)
}

fn sphere_point(lng_rad: f64, lat_rad: f64) -> DVec3 {
    DVec3::new(
        lng_rad.sin() * lat_rad.cos(),
        lat_rad.sin(),
        lng_rad.cos() * lat_rad.cos(),
    )
}

/// Tight bounds of a tile's patch of the unit sphere.
///
/// Tiles on the first or last row extend to the pole, matching the meshes
/// drawn for them.
pub fn tile_sphere_bounds(tile: TileCoord) -> Aabb3 {
    let (lng_min, mut lat_min, lng_max, mut lat_max) = tile.bounds_wgs84();
    if tile.touches_north_pole() {
        lat_max = 90.0;
    }
    if tile.touches_south_pole() {
        lat_min = -90.0;
    }
    let (lng_min, lng_max) = (lng_min.to_radians(), lng_max.to_radians());
    let (lat_min, lat_max) = (lat_min.to_radians(), lat_max.to_radians());

    let mut lngs = vec![lng_min, lng_max];
    for k in -2..=2 {
        let extreme = f64::from(k) * FRAC_PI_2;
        if extreme > lng_min && extreme < lng_max {
            lngs.push(extreme);
        }
    }
    let mut cos_lats = vec![lat_min.cos(), lat_max.cos()];
    if lat_min < 0.0 && lat_max > 0.0 {
        cos_lats.push(1.0);
    }

    let mut min = DVec3::new(f64::INFINITY, lat_min.sin(), f64::INFINITY);
    let mut max = DVec3::new(f64::NEG_INFINITY, lat_max.sin(), f64::NEG_INFINITY);
    for &lng in &lngs {
        for &c in &cos_lats {
            let x = lng.sin() * c;
            let z = lng.cos() * c;
            min.x = min.x.min(x);
            max.x = max.x.max(x);
            min.z = min.z.min(z);
            max.z = max.z.max(z);
        }
    }
    Aabb3::new(min, max)
}
