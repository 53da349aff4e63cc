//! Glyph placement along projected lines.
//!
//! Glyphs are positioned by walking the label's line in the label plane
//! from the anchor, one projected vertex at a time, until the glyph's
//! horizontal offset is used up. Vertices behind the camera are replaced by
//! a synthetic vertex along the segment, long enough to hold the glyph.

use std::collections::HashMap;
use std::f64::consts::PI;

use foundation::math::{DVec2, line_intersection};

use crate::projector::LabelProjector;
use crate::symbol::{LineVertex, ONE_EM, PlacedSymbol, WritingMode, vertex_point};

/// Projected line vertices of one symbol, shared by all its glyphs.
#[derive(Debug, Default, Clone)]
pub struct ProjectionCache {
    projections: HashMap<usize, DVec2>,
    offsets: HashMap<(usize, isize), DVec2>,
    anchor: Option<DVec2>,
    any_projection_occluded: bool,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Some vertex projected so far is on the far side of the globe.
    pub fn any_projection_occluded(&self) -> bool {
        self.any_projection_occluded
    }

    pub fn projected_vertex(&self, index: usize) -> Option<DVec2> {
        self.projections.get(&index).copied()
    }
}

/// The line a symbol follows: a slice of the shared vertex array.
#[derive(Debug, Copy, Clone)]
pub struct SymbolLine<'a> {
    pub vertices: &'a [LineVertex],
    pub start: usize,
    pub end: usize,
    /// Tile-local anchor.
    pub anchor: DVec2,
    /// Anchor segment, relative to `start`.
    pub segment: usize,
}

impl<'a> SymbolLine<'a> {
    pub fn of(symbol: &PlacedSymbol, vertices: &'a [LineVertex]) -> Self {
        Self {
            vertices,
            start: symbol.line_start_index,
            end: symbol.line_end_index().min(vertices.len()),
            anchor: symbol.anchor,
            segment: symbol.segment,
        }
    }

    fn contains(&self, index: isize) -> bool {
        index >= self.start as isize && index < self.end as isize
    }

    fn tile_point(&self, index: usize) -> DVec2 {
        self.vertices
            .get(index)
            .copied()
            .map(vertex_point)
            .unwrap_or(self.anchor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    /// Label-plane position.
    pub point: DVec2,
    pub angle: f64,
    /// Label-plane vertices walked to reach `point`, ending with it.
    pub path: Vec<DVec2>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrientationChange {
    /// The label reads backwards; place it again flipped.
    NeedsFlip,
    /// The line is closer to vertical; show the vertical rendition instead.
    UseVertical,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlyphPlacement {
    Placed(Vec<PlacedGlyph>),
    NotEnoughRoom,
    Reorient(OrientationChange),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphParams {
    /// Font size after perspective scaling.
    pub font_size: f64,
    pub flip: bool,
    pub keep_upright: bool,
    /// Viewport width over height.
    pub aspect_ratio: f64,
    pub rotate_to_line: bool,
}

/// What a vertex behind the camera is replaced with.
#[derive(Debug, Copy, Clone)]
struct SyntheticVertex {
    distance_from_anchor: f64,
    previous: DVec2,
    direction: isize,
    abs_offset_x: f64,
}

/// Places one glyph `offset_x` label-plane units from the anchor along the line.
///
/// `line_offset` shifts the text along (`x`) and perpendicular to (`y`) the
/// line. Returns `None` when the line ends before the offset is reached.
pub fn place_glyph_along_line(
    projector: &dyn LabelProjector,
    cache: &mut ProjectionCache,
    line: &SymbolLine<'_>,
    offset_x: f64,
    line_offset: DVec2,
    flip: bool,
    rotate_to_line: bool,
) -> Option<PlacedGlyph> {
    let combined_offset_x = if flip {
        offset_x - line_offset.x
    } else {
        offset_x + line_offset.x
    };
    let mut dir: isize = if combined_offset_x > 0.0 { 1 } else { -1 };
    let mut angle = 0.0;
    if flip {
        dir = -dir;
        angle = PI;
    }
    if dir < 0 {
        angle += PI;
    }

    let mut index = (line.start + line.segment) as isize + if dir > 0 { 0 } else { 1 };
    let mut current = match cache.anchor {
        Some(anchor) => anchor,
        None => {
            let anchor = projector.project(line.anchor).point;
            cache.anchor = Some(anchor);
            anchor
        }
    };
    let mut prev = current;
    let mut prev_offset: Option<DVec2> = None;
    let mut current_offset: Option<DVec2> = None;
    let mut distance_to_prev = 0.0;
    let mut segment_distance = 0.0;
    let mut segment = DVec2::ZERO;
    let abs_offset_x = combined_offset_x.abs();
    let mut path = Vec::new();

    while distance_to_prev + segment_distance <= abs_offset_x {
        index += dir;
        if !line.contains(index) {
            return None;
        }

        distance_to_prev += segment_distance;
        prev = current;
        prev_offset = current_offset;
        let synthetic = SyntheticVertex {
            distance_from_anchor: distance_to_prev,
            previous: prev,
            direction: dir,
            abs_offset_x,
        };
        current = project_line_vertex(projector, cache, line, index as usize, &synthetic);

        if line_offset.y == 0.0 {
            path.push(prev);
            segment = current - prev;
        } else {
            let prev_to_current = current - prev;
            let normal = if prev_to_current.length() == 0.0 {
                // Degenerate segment: borrow the direction of the next one.
                let next_index = index + dir;
                if line.contains(next_index) {
                    let next = project_line_vertex(
                        projector,
                        cache,
                        line,
                        next_index as usize,
                        &synthetic,
                    );
                    offset_normal(next - current, line_offset.y, dir)
                } else {
                    DVec2::ZERO
                }
            } else {
                offset_normal(prev_to_current, line_offset.y, dir)
            };
            let start = *prev_offset.get_or_insert(prev + normal);
            let end = offset_intersection(
                projector,
                cache,
                line,
                index as usize,
                normal,
                current,
                start,
                line_offset.y,
                &synthetic,
            );
            current_offset = Some(end);
            path.push(start);
            segment = end - start;
        }
        segment_distance = segment.length();
    }

    let t = (abs_offset_x - distance_to_prev) / segment_distance;
    let point = prev_offset.unwrap_or(prev) + segment * t;
    path.push(point);
    let segment_angle = angle + (current.y - prev.y).atan2(current.x - prev.x);
    Some(PlacedGlyph {
        point,
        angle: if rotate_to_line { segment_angle } else { 0.0 },
        path,
    })
}

/// Places every glyph of `symbol`, or reports why it cannot be placed as is.
///
/// The first and last glyph go first: their positions decide whether the
/// label must be flipped or swapped for its vertical rendition, and if
/// they fit every glyph between them does too.
pub fn place_glyphs_along_line(
    projector: &dyn LabelProjector,
    cache: &mut ProjectionCache,
    symbol: &PlacedSymbol,
    vertices: &[LineVertex],
    params: &GlyphParams,
) -> GlyphPlacement {
    let font_scale = params.font_size / ONE_EM;
    let line_offset = symbol.line_offset * font_scale;
    let line = SymbolLine::of(symbol, vertices);
    let check_orientation = params.keep_upright && !params.flip;
    let place = |cache: &mut ProjectionCache, offset: f64| {
        place_glyph_along_line(
            projector,
            cache,
            &line,
            offset * font_scale,
            line_offset,
            params.flip,
            params.rotate_to_line,
        )
    };

    match symbol.glyph_offsets.as_slice() {
        [] => GlyphPlacement::Placed(Vec::new()),
        [single] => {
            if check_orientation {
                let a = projector.project(symbol.anchor).point;
                let end_index = symbol.line_start_index + symbol.segment + 1;
                let Some(&end) = vertices.get(end_index) else {
                    return GlyphPlacement::NotEnoughRoom;
                };
                let end = vertex_point(end);
                let projected = projector.project(end);
                // The segment end may be behind the camera; any closer point
                // on the segment gives the same direction.
                let b = if projected.signed_distance_from_camera > 0.0 {
                    projected.point
                } else {
                    project_truncated_line_segment(projector, symbol.anchor, end, a, 1.0)
                };
                if let Some(change) =
                    requires_orientation_change(symbol.writing_mode, a, b, params.aspect_ratio)
                {
                    return GlyphPlacement::Reorient(change);
                }
            }
            match place(cache, *single) {
                Some(glyph) if !cache.any_projection_occluded => GlyphPlacement::Placed(vec![glyph]),
                _ => GlyphPlacement::NotEnoughRoom,
            }
        }
        [first_offset, middle @ .., last_offset] => {
            let Some(first) = place(cache, *first_offset) else {
                return GlyphPlacement::NotEnoughRoom;
            };
            let Some(last) = place(cache, *last_offset) else {
                return GlyphPlacement::NotEnoughRoom;
            };
            if cache.any_projection_occluded {
                return GlyphPlacement::NotEnoughRoom;
            }
            if check_orientation
                && let Some(change) = requires_orientation_change(
                    symbol.writing_mode,
                    first.point,
                    last.point,
                    params.aspect_ratio,
                )
            {
                return GlyphPlacement::Reorient(change);
            }
            let mut glyphs = Vec::with_capacity(symbol.glyph_count());
            glyphs.push(first);
            for offset in middle {
                match place(cache, *offset) {
                    Some(glyph) => glyphs.push(glyph),
                    None => return GlyphPlacement::NotEnoughRoom,
                }
            }
            glyphs.push(last);
            GlyphPlacement::Placed(glyphs)
        }
    }
}

/// Whether a label running from `first` to `last` in the label plane reads
/// correctly as laid out.
pub fn requires_orientation_change(
    writing_mode: WritingMode,
    first: DVec2,
    last: DVec2,
    aspect_ratio: f64,
) -> Option<OrientationChange> {
    if writing_mode == WritingMode::Horizontal {
        let rise = (last.y - first.y).abs();
        let run = (last.x - first.x).abs() * aspect_ratio;
        if rise > run {
            return Some(OrientationChange::UseVertical);
        }
    }
    let backwards = match writing_mode {
        WritingMode::Vertical => first.y < last.y,
        WritingMode::Horizontal => first.x > last.x,
    };
    backwards.then_some(OrientationChange::NeedsFlip)
}

/// A label-plane point `minimum_length` away from `previous_projected`, in the
/// projected direction of the tile segment `previous_tile -> current_tile`.
///
/// Assumes `previous_tile` itself projects in front of the camera.
pub fn project_truncated_line_segment(
    projector: &dyn LabelProjector,
    previous_tile: DVec2,
    current_tile: DVec2,
    previous_projected: DVec2,
    minimum_length: f64,
) -> DVec2 {
    let behind = previous_tile + (previous_tile - current_tile).normalize_or_zero();
    let projected_behind = projector.project(behind).point;
    let unit_segment = previous_projected - projected_behind;
    let length = unit_segment.length();
    if length == 0.0 {
        return previous_projected;
    }
    previous_projected + unit_segment * (minimum_length / length)
}

fn project_line_vertex(
    projector: &dyn LabelProjector,
    cache: &mut ProjectionCache,
    line: &SymbolLine<'_>,
    index: usize,
    synthetic: &SyntheticVertex,
) -> DVec2 {
    if let Some(point) = cache.projections.get(&index) {
        return *point;
    }
    let tile_point = line.tile_point(index);
    let projection = projector.project(tile_point);
    if projection.signed_distance_from_camera > 0.0 {
        cache.projections.insert(index, projection.point);
        cache.any_projection_occluded |= projection.is_occluded;
        return projection.point;
    }

    let previous_tile = if synthetic.distance_from_anchor == 0.0 {
        line.anchor
    } else {
        line.tile_point((index as isize - synthetic.direction) as usize)
    };
    let minimum_length = synthetic.abs_offset_x - synthetic.distance_from_anchor + 1.0;
    project_truncated_line_segment(
        projector,
        previous_tile,
        tile_point,
        synthetic.previous,
        minimum_length,
    )
}

fn offset_normal(segment: DVec2, line_offset_y: f64, direction: isize) -> DVec2 {
    segment.normalize_or_zero().perp() * (line_offset_y * direction as f64)
}

/// End of the offset segment ending at vertex `index`: where it meets the
/// offset of the following segment, or the plain offset vertex at line ends
/// and for parallel segments.
#[allow(clippy::too_many_arguments)]
fn offset_intersection(
    projector: &dyn LabelProjector,
    cache: &mut ProjectionCache,
    line: &SymbolLine<'_>,
    index: usize,
    prev_to_current_normal: DVec2,
    current: DVec2,
    offset_previous: DVec2,
    line_offset_y: f64,
    synthetic: &SyntheticVertex,
) -> DVec2 {
    let key = (index, synthetic.direction);
    if let Some(point) = cache.offsets.get(&key) {
        return *point;
    }
    let offset_current = current + prev_to_current_normal;
    let next_index = index as isize + synthetic.direction;
    let point = if line.contains(next_index) {
        let next = project_line_vertex(projector, cache, line, next_index as usize, synthetic);
        let next_normal = offset_normal(next - current, line_offset_y, synthetic.direction);
        line_intersection(
            offset_previous,
            offset_current,
            current + next_normal,
            next + next_normal,
        )
        .unwrap_or(offset_current)
    } else {
        offset_current
    };
    cache.offsets.insert(key, point);
    point
}
