//! Web-Mercator conversions.
//!
//! Normalized Mercator space maps the whole world onto the unit square:
//! `x` grows eastward from the antimeridian, `y` grows southward from the
//! northern Mercator limit. `z` is altitude expressed in the same units.

use core::f64::consts::PI;

/// Tile-local integer grid size of one tile.
pub const EXTENT: f64 = 8192.0;

/// Highest latitude (degrees) that Web-Mercator can represent.
pub const MAX_VALID_LATITUDE: f64 = 85.051129;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub fn earth_circumference_m() -> f64 {
    2.0 * PI * EARTH_RADIUS_M
}

pub fn circumference_at_latitude_m(lat_deg: f64) -> f64 {
    earth_circumference_m() * lat_deg.to_radians().cos()
}

pub fn mercator_x_from_lng(lng_deg: f64) -> f64 {
    (180.0 + lng_deg) / 360.0
}

pub fn mercator_y_from_lat(lat_deg: f64) -> f64 {
    (180.0 - (180.0 / PI) * (PI / 4.0 + lat_deg * PI / 360.0).tan().ln()) / 360.0
}

pub fn lng_from_mercator_x(x: f64) -> f64 {
    x * 360.0 - 180.0
}

pub fn lat_from_mercator_y(y: f64) -> f64 {
    let y2 = 180.0 - y * 360.0;
    360.0 / PI * (y2 * PI / 180.0).exp().atan() - 90.0
}

/// Altitude in meters converted to Mercator units at the given latitude.
pub fn mercator_z_from_altitude(altitude_m: f64, lat_deg: f64) -> f64 {
    altitude_m / circumference_at_latitude_m(lat_deg)
}

pub fn altitude_from_mercator_z(z: f64, y: f64) -> f64 {
    z * circumference_at_latitude_m(lat_from_mercator_y(y))
}

/// Ratio by which Mercator stretches distances at `lat_deg`.
pub fn mercator_scale(lat_deg: f64) -> f64 {
    1.0 / lat_deg.to_radians().cos()
}

pub fn zoom_scale(zoom: f64) -> f64 {
    zoom.exp2()
}

pub fn scale_zoom(scale: f64) -> f64 {
    scale.log2()
}

/// Wraps `value` into `[min, max)`; values already equal to `max` are kept.
pub fn wrap(value: f64, min: f64, max: f64) -> f64 {
    let d = max - min;
    let w = ((value - min) % d + d) % d + min;
    if w == min && value == max { max } else { w }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MercatorCoordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MercatorCoordinate {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_lng_lat(lng_deg: f64, lat_deg: f64, altitude_m: f64) -> Self {
        Self {
            x: mercator_x_from_lng(lng_deg),
            y: mercator_y_from_lat(lat_deg),
            z: mercator_z_from_altitude(altitude_m, lat_deg),
        }
    }

    pub fn lng(&self) -> f64 {
        lng_from_mercator_x(self.x)
    }

    pub fn lat(&self) -> f64 {
        lat_from_mercator_y(self.y)
    }

    /// Size of one meter in Mercator units at this coordinate's latitude.
    pub fn meter_in_mercator_units(&self) -> f64 {
        1.0 / earth_circumference_m() * mercator_scale(self.lat())
    }
}
