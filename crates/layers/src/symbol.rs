//! Symbol data handed over by layout, and the per-frame vertex stream
//! the line-label pass writes into.

use bytemuck::{Pod, Zeroable};
use foundation::math::DVec2;
use serde::{Deserialize, Serialize};

/// Glyph offsets and line offsets are laid out for this font size.
pub const ONE_EM: f64 = 24.0;

/// Vertices emitted per glyph quad.
pub const VERTICES_PER_GLYPH: usize = 4;

/// A line vertex in tile-local integer coordinates.
pub type LineVertex = [i16; 2];

pub(crate) fn vertex_point(vertex: LineVertex) -> DVec2 {
    DVec2::new(f64::from(vertex[0]), f64::from(vertex[1]))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingMode {
    #[default]
    Horizontal,
    Vertical,
}

/// One label laid out along a line.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSymbol {
    /// Tile-local anchor on the line.
    pub anchor: DVec2,
    pub writing_mode: WritingMode,
    /// Horizontal glyph offsets from the anchor, in ems at [`ONE_EM`].
    pub glyph_offsets: Vec<f64>,
    /// First glyph of this symbol in the dynamic vertex stream.
    pub glyph_start_index: usize,
    /// First vertex of the symbol's line in the shared vertex array.
    pub line_start_index: usize,
    pub line_length: usize,
    /// Segment of the line, relative to `line_start_index`, the anchor lies on.
    pub segment: usize,
    /// Along-line (`x`) and perpendicular (`y`) offset of the text, in ems.
    pub line_offset: DVec2,
    /// Feature sizes at the lower and upper zoom stop.
    pub lower_size: f64,
    pub upper_size: f64,
    /// Collided or faded out.
    pub hidden: bool,
    /// Index of the vertical rendition of this label, if layout made one.
    pub vertical_alternative: Option<usize>,
}

impl PlacedSymbol {
    pub fn glyph_count(&self) -> usize {
        self.glyph_offsets.len()
    }

    pub fn line_end_index(&self) -> usize {
        self.line_start_index + self.line_length
    }
}

/// How a symbol's font size is evaluated for the current zoom.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SymbolSize {
    /// Same size for every feature.
    Constant { size: f64 },
    /// Per-feature size, not zoom dependent.
    Source,
    /// Per-feature sizes at two zoom stops, blended by `t`.
    Composite { t: f64 },
}

impl Default for SymbolSize {
    fn default() -> Self {
        SymbolSize::Constant { size: 16.0 }
    }
}

impl SymbolSize {
    pub fn evaluate(&self, symbol: &PlacedSymbol) -> f64 {
        match *self {
            SymbolSize::Constant { size } => size,
            SymbolSize::Source => symbol.lower_size,
            SymbolSize::Composite { t } => {
                symbol.lower_size + (symbol.upper_size - symbol.lower_size) * t.clamp(0.0, 1.0)
            }
        }
    }
}

/// Per-vertex attributes recomputed every frame for line labels.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DynamicGlyphVertex {
    /// Label-plane position of the glyph anchor.
    pub position: [f32; 2],
    pub angle: f32,
}

impl DynamicGlyphVertex {
    /// Off-screen sentinel; the shader collapses quads that carry it.
    pub const HIDDEN: Self = Self {
        position: [f32::NEG_INFINITY, f32::NEG_INFINITY],
        angle: 0.0,
    };

    pub fn new(position: DVec2, angle: f64) -> Self {
        Self {
            position: [position.x as f32, position.y as f32],
            angle: angle as f32,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.position[0] == f32::NEG_INFINITY
    }
}

/// Dynamic vertices for every glyph of a tile's line labels, four per glyph,
/// addressed by glyph index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DynamicVertexStream {
    vertices: Vec<DynamicGlyphVertex>,
}

impl DynamicVertexStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the stream for `glyph_count` glyphs, all hidden.
    pub fn reset(&mut self, glyph_count: usize) {
        self.vertices.clear();
        self.vertices
            .resize(glyph_count * VERTICES_PER_GLYPH, DynamicGlyphVertex::HIDDEN);
    }

    pub fn write_glyph(&mut self, glyph_index: usize, position: DVec2, angle: f64) {
        self.fill(glyph_index, 1, DynamicGlyphVertex::new(position, angle));
    }

    pub fn hide_glyphs(&mut self, glyph_index: usize, count: usize) {
        self.fill(glyph_index, count, DynamicGlyphVertex::HIDDEN);
    }

    fn fill(&mut self, glyph_index: usize, count: usize, vertex: DynamicGlyphVertex) {
        let start = glyph_index * VERTICES_PER_GLYPH;
        let end = start + count * VERTICES_PER_GLYPH;
        if end > self.vertices.len() {
            self.vertices.resize(end, DynamicGlyphVertex::HIDDEN);
        }
        self.vertices[start..end].fill(vertex);
    }

    pub fn vertices(&self) -> &[DynamicGlyphVertex] {
        &self.vertices
    }

    pub fn glyph(&self, glyph_index: usize) -> Option<&DynamicGlyphVertex> {
        self.vertices.get(glyph_index * VERTICES_PER_GLYPH)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
