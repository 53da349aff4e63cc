//! Subdivided tile meshes for curved projections.
//!
//! A flat tile is two triangles; on a sphere it needs enough vertices for the
//! surface to look round. Meshes depend only on a small key, so one instance
//! per key is built and shared until the rendering context goes away.

use std::collections::HashMap;
use std::sync::Arc;

use foundation::math::EXTENT;

/// Grid cells per tile side at zoom 0.
pub const BASE_MESH_GRANULARITY: u32 = 128;

/// How far a bordered mesh reaches past the tile edge, in tile units.
pub const MESH_BORDER: i16 = 128;

/// Y coordinate marking vertices collapsed onto the north pole.
pub const NORTH_POLE_Y: i16 = i16::MIN;
/// Y coordinate marking vertices collapsed onto the south pole.
pub const SOUTH_POLE_Y: i16 = i16::MAX;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileMeshVertex {
    pub position: [i16; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileMeshKey {
    pub granularity: u32,
    pub has_border: bool,
    pub has_north_pole: bool,
    pub has_south_pole: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TileMesh {
    pub vertices: Vec<TileMeshVertex>,
    pub indices: Vec<u16>,
}

impl TileMesh {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Grid of `granularity x granularity` cells, plus a strip of triangles
    /// to each requested pole.
    pub fn build(key: &TileMeshKey) -> Self {
        let cells = key.granularity.clamp(1, BASE_MESH_GRANULARITY) as usize;
        let row = cells + 1;
        let coord = |i: usize| -> i16 {
            let base = (i as f64 * EXTENT / cells as f64).round() as i16;
            match (key.has_border, i) {
                (true, 0) => -MESH_BORDER,
                (true, i) if i == cells => EXTENT as i16 + MESH_BORDER,
                _ => base,
            }
        };

        let mut mesh = TileMesh::default();
        for y in 0..row {
            for x in 0..row {
                mesh.vertices.push(TileMeshVertex {
                    position: [coord(x), coord(y)],
                });
            }
        }
        for y in 0..cells {
            for x in 0..cells {
                let a = (y * row + x) as u16;
                let b = a + 1;
                let c = a + row as u16;
                let d = c + 1;
                mesh.indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        if key.has_north_pole {
            mesh.push_pole_strip(0, NORTH_POLE_Y, row, coord, false);
        }
        if key.has_south_pole {
            mesh.push_pole_strip(cells * row, SOUTH_POLE_Y, row, coord, true);
        }
        mesh
    }

    fn push_pole_strip(
        &mut self,
        edge_start: usize,
        pole_y: i16,
        row: usize,
        coord: impl Fn(usize) -> i16,
        flip: bool,
    ) {
        let pole_start = self.vertices.len();
        for x in 0..row {
            self.vertices.push(TileMeshVertex {
                position: [coord(x), pole_y],
            });
        }
        for x in 0..row - 1 {
            let e0 = (edge_start + x) as u16;
            let e1 = e0 + 1;
            let p0 = (pole_start + x) as u16;
            let p1 = p0 + 1;
            if flip {
                self.indices.extend_from_slice(&[e0, p0, e1, e1, p0, p1]);
            } else {
                self.indices.extend_from_slice(&[p0, e0, p1, p1, e0, e1]);
            }
        }
    }
}

/// Mesh subdivision for a tile zoom: halves each level, never below 1.
pub fn granularity_for_zoom(z: u8) -> u32 {
    (BASE_MESH_GRANULARITY >> z.min(31)).max(1)
}

/// Built meshes by key. Cleared when the rendering context is lost.
#[derive(Debug, Default)]
pub struct TileMeshCache {
    meshes: HashMap<TileMeshKey, Arc<TileMesh>>,
}

impl TileMeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, key: TileMeshKey) -> Arc<TileMesh> {
        self.meshes
            .entry(key)
            .or_insert_with_key(|key| Arc::new(TileMesh::build(key)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}
