//! Visible tile selection.
//!
//! Depth-first walk over the implicit quadtree, one root per world copy.
//! The projection model decides visibility and distance through
//! [`CoverageView`]; this module only owns the level-of-detail policy and the
//! output ordering.

use foundation::bounds::Aabb3;
use foundation::math::{DVec2, DVec3, StableF64};
use scene::camera::CameraState;
use scene::visibility::IntersectionResult;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::tile::{OverscaledTileId, TileCoord};

/// Tiles within this many max-zoom tile widths of the focus are kept at full detail.
pub const MAX_DETAIL_RADIUS_TILES: f64 = 3.0;

/// Deepest zoom the search will ever descend to.
pub const MAX_TILE_ZOOM: u8 = 24;

/// World copies searched on each side of the primary world.
pub const WORLD_COPIES_PER_SIDE: i32 = 3;

/// Terrain bounds for tiles, in meters.
pub trait ElevationProvider {
    fn min_max_elevation(&self, tile: TileCoord) -> Option<(f64, f64)>;
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoveringTilesOptions {
    /// Size of the source's tiles in pixels.
    pub tile_size: u32,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    pub round_zoom: bool,
    /// Keep loading tiles at `max_zoom` but label them with the view's zoom.
    pub reparse_overscaled: bool,
}

impl Default for CoveringTilesOptions {
    fn default() -> Self {
        Self {
            tile_size: 512,
            min_zoom: None,
            max_zoom: None,
            round_zoom: false,
            reparse_overscaled: false,
        }
    }
}

/// What the tile search needs to know about the active projection.
///
/// Distances are in normalized Mercator units. `wrap` is the world copy a
/// tile is evaluated in.
pub trait CoverageView {
    fn camera(&self) -> &CameraState;

    /// Classifies a tile against what the camera can see. `elevation` carries
    /// the tile's terrain range in meters when an [`ElevationProvider`] is set.
    fn tile_visibility(
        &self,
        tile: TileCoord,
        wrap: i32,
        elevation: Option<(f64, f64)>,
    ) -> IntersectionResult;

    /// Distance from `focus` to the tile footprint; 0 when the focus is inside.
    fn distance_to_tile(&self, focus: DVec2, tile: TileCoord, wrap: i32) -> f64 {
        flat_distance_to_tile(focus, tile, wrap)
    }

    /// World copy a leaf is reported in.
    fn leaf_wrap(&self, _focus: DVec2, _tile: TileCoord, parent_wrap: i32) -> i32 {
        parent_wrap
    }

    /// Whether roots are seeded for neighbouring world copies.
    fn allow_world_copies(&self) -> bool {
        self.camera().render_world_copies()
    }
}

/// Footprint of a tile in normalized Mercator units, shifted into `wrap`.
pub fn mercator_bounds(tile: TileCoord, wrap: i32) -> Aabb3 {
    let size = tile.mercator_size();
    let origin = tile.mercator_origin() + DVec2::new(wrap as f64, 0.0);
    Aabb3::new(
        DVec3::new(origin.x, origin.y, 0.0),
        DVec3::new(origin.x + size, origin.y + size, 0.0),
    )
}

/// Planar distance from `focus` to the tile footprint in `wrap`.
pub fn flat_distance_to_tile(focus: DVec2, tile: TileCoord, wrap: i32) -> f64 {
    let bounds = mercator_bounds(tile, wrap);
    DVec2::new(bounds.distance_x(focus.x), bounds.distance_y(focus.y)).length()
}

/// Ideal tile zoom for the camera given the source's tile size. Never negative.
pub fn covering_zoom_level(camera: &CameraState, options: &CoveringTilesOptions) -> f64 {
    let z = camera.zoom() + (camera.tile_size() / options.tile_size.max(1) as f64).log2();
    let z = if options.round_zoom { z.round() } else { z.floor() };
    z.max(0.0)
}

/// A tile chosen by [`covering_tiles`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveredTile {
    pub id: OverscaledTileId,
    /// Squared distance from the focus to the tile center, in tiles of the target zoom.
    pub distance_sq: f64,
}

struct StackEntry {
    tile: TileCoord,
    wrap: i32,
    fully_visible: bool,
}

/// Returns the tiles needed to draw the current view, nearest first.
///
/// Tiles within [`MAX_DETAIL_RADIUS_TILES`] of the focus are emitted at the
/// target zoom; further away the search stops earlier, the allowed distance
/// doubling with every level shallower.
pub fn covering_tiles(
    view: &dyn CoverageView,
    options: &CoveringTilesOptions,
    elevation: Option<&dyn ElevationProvider>,
) -> Vec<CoveredTile> {
    let camera = view.camera();
    let desired_z = covering_zoom_level(camera, options).min(f64::from(MAX_TILE_ZOOM)) as u8;
    let min_zoom = options.min_zoom.unwrap_or(0);
    if desired_z < min_zoom {
        return Vec::new();
    }
    let max_zoom = options
        .max_zoom
        .unwrap_or(camera.constraints().max_zoom.floor() as u8)
        .clamp(min_zoom, MAX_TILE_ZOOM);
    let nominal_z = desired_z.min(max_zoom);

    let center = camera.center_mercator();
    let focus = DVec2::new(center.x, center.y);
    let nominal_tiles = f64::from(nominal_z).exp2();

    let root = TileCoord::new(0, 0, 0);
    let mut stack = Vec::new();
    if view.allow_world_copies() {
        for offset in 1..=WORLD_COPIES_PER_SIDE {
            for wrap in [-offset, offset] {
                stack.push(StackEntry {
                    tile: root,
                    wrap,
                    fully_visible: false,
                });
            }
        }
    }
    stack.push(StackEntry {
        tile: root,
        wrap: 0,
        fully_visible: false,
    });

    let mut result = Vec::new();
    while let Some(entry) = stack.pop() {
        let StackEntry {
            tile,
            wrap,
            mut fully_visible,
        } = entry;

        if !fully_visible {
            let range = elevation.and_then(|provider| provider.min_max_elevation(tile));
            match view.tile_visibility(tile, wrap, range) {
                IntersectionResult::None => continue,
                IntersectionResult::Full => fully_visible = true,
                IntersectionResult::Partial => {}
            }
        }

        let distance = view.distance_to_tile(focus, tile, wrap) * nominal_tiles;
        let split_limit = if tile.z < nominal_z {
            MAX_DETAIL_RADIUS_TILES * f64::from(nominal_z - tile.z - 1).exp2()
        } else {
            0.0
        };
        let is_leaf = tile.z >= nominal_z || (tile.z >= min_zoom && distance > split_limit);

        if is_leaf {
            let leaf_wrap = view.leaf_wrap(focus, tile, wrap);
            let overscaled_z = if options.reparse_overscaled && tile.z == nominal_z {
                desired_z.max(tile.z)
            } else {
                tile.z
            };
            let tile_center = tile.mercator_origin()
                + DVec2::splat(tile.mercator_size() * 0.5)
                + DVec2::new(leaf_wrap as f64, 0.0);
            let delta = (tile_center - focus) * nominal_tiles;
            result.push(CoveredTile {
                id: OverscaledTileId::new(overscaled_z, leaf_wrap, tile),
                distance_sq: delta.length_squared(),
            });
            continue;
        }

        for child in tile.children() {
            stack.push(StackEntry {
                tile: child,
                wrap,
                fully_visible,
            });
        }
    }

    result.sort_by(|a, b| {
        StableF64(a.distance_sq)
            .cmp(&StableF64(b.distance_sq))
            .then_with(|| a.id.cmp(&b.id))
    });
    result.dedup_by(|a, b| a.id == b.id);

    trace!(
        zoom = camera.zoom(),
        target_zoom = nominal_z,
        tiles = result.len(),
        "covering tiles"
    );
    result
}
