//! Tile identity.
//!
//! - [`TileCoord`]: canonical ZXY address, `x, y < 2^z`.
//! - [`UnwrappedTileId`]: a canonical tile placed in one world copy.
//! - [`OverscaledTileId`]: what the loader requests; may carry a logical zoom
//!   above the canonical one when higher-zoom tiles are reparsed from it.

use std::cmp::Ordering;
use std::fmt;

use foundation::math::{DVec2, EXTENT};
use serde::{Deserialize, Serialize};

/// Tile coordinate in ZXY scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        debug_assert!(z < 32, "zoom {z} out of range");
        debug_assert!(
            (x as u64) < (1u64 << z) && (y as u64) < (1u64 << z),
            "tile {z}/{x}/{y} outside its zoom level"
        );
        Self { z, x, y }
    }

    /// Number of tiles along one axis at zoom `z`.
    pub fn tiles_per_axis(z: u8) -> u64 {
        1u64 << z
    }

    /// Returns the geographic bounds of this tile in WGS84 (lon_min, lat_min, lon_max, lat_max).
    pub fn bounds_wgs84(&self) -> (f64, f64, f64, f64) {
        let n = Self::tiles_per_axis(self.z) as f64;
        let lon_min = (self.x as f64 / n) * 360.0 - 180.0;
        let lon_max = ((self.x + 1) as f64 / n) * 360.0 - 180.0;

        // Web Mercator Y flip
        let lat_max = tile_y_to_lat(self.y, self.z);
        let lat_min = tile_y_to_lat(self.y + 1, self.z);

        (lon_min, lat_min, lon_max, lat_max)
    }

    /// Size of one tile in normalized Mercator units.
    pub fn mercator_size(&self) -> f64 {
        1.0 / Self::tiles_per_axis(self.z) as f64
    }

    /// North-west corner in normalized Mercator units.
    pub fn mercator_origin(&self) -> DVec2 {
        DVec2::new(self.x as f64, self.y as f64) * self.mercator_size()
    }

    /// Tile-local coordinates (`0..EXTENT`) to normalized Mercator.
    pub fn tile_to_mercator(&self, x: f64, y: f64) -> DVec2 {
        self.mercator_origin() + DVec2::new(x, y) / EXTENT * self.mercator_size()
    }

    pub fn children(&self) -> [TileCoord; 4] {
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        [
            TileCoord::new(z, x, y),
            TileCoord::new(z, x + 1, y),
            TileCoord::new(z, x, y + 1),
            TileCoord::new(z, x + 1, y + 1),
        ]
    }

    pub fn touches_north_pole(&self) -> bool {
        self.y == 0
    }

    pub fn touches_south_pole(&self) -> bool {
        self.y as u64 == Self::tiles_per_axis(self.z) - 1
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

fn tile_y_to_lat(y: u32, z: u8) -> f64 {
    let n = std::f64::consts::PI
        - 2.0 * std::f64::consts::PI * (y as f64) / TileCoord::tiles_per_axis(z) as f64;
    (0.5 * (n.exp() - (-n).exp())).atan().to_degrees()
}

/// A canonical tile in a specific world copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnwrappedTileId {
    pub wrap: i32,
    pub canonical: TileCoord,
}

impl UnwrappedTileId {
    pub fn new(wrap: i32, canonical: TileCoord) -> Self {
        Self { wrap, canonical }
    }

    /// Column index counted across world copies.
    pub fn unwrapped_x(&self) -> i64 {
        self.canonical.x as i64 + TileCoord::tiles_per_axis(self.canonical.z) as i64 * self.wrap as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverscaledTileId {
    pub overscaled_z: u8,
    pub wrap: i32,
    pub canonical: TileCoord,
}

impl OverscaledTileId {
    pub fn new(overscaled_z: u8, wrap: i32, canonical: TileCoord) -> Self {
        debug_assert!(overscaled_z >= canonical.z);
        Self {
            overscaled_z,
            wrap,
            canonical,
        }
    }

    pub fn unwrapped(&self) -> UnwrappedTileId {
        UnwrappedTileId::new(self.wrap, self.canonical)
    }

    /// How many times the canonical tile is magnified to stand in for `overscaled_z`.
    pub fn overscale_factor(&self) -> f64 {
        f64::from(self.overscaled_z - self.canonical.z).exp2()
    }
}

impl Ord for OverscaledTileId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.overscaled_z
            .cmp(&other.overscaled_z)
            .then_with(|| self.wrap.cmp(&other.wrap))
            .then_with(|| self.canonical.x.cmp(&other.canonical.x))
            .then_with(|| self.canonical.y.cmp(&other.canonical.y))
            .then_with(|| self.canonical.z.cmp(&other.canonical.z))
    }
}

impl PartialOrd for OverscaledTileId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OverscaledTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[w{}]", self.canonical, self.overscaled_z, self.wrap)
    }
}
