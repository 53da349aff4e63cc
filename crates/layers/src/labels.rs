use foundation::math::DVec2;
use projection::model::{ElevationFn, ProjectionModel, TranslateAnchor};
use serde::{Deserialize, Serialize};
use streaming::tile::OverscaledTileId;
use tracing::trace;

use crate::placement::{
    GlyphParams, GlyphPlacement, OrientationChange, PlacedGlyph, ProjectionCache,
    place_glyphs_along_line,
};
use crate::projector::{
    LabelPlaneProjector, clipping_buffer, is_in_padded_viewport, perspective_ratio,
};
use crate::symbol::{DynamicVertexStream, LineVertex, PlacedSymbol, SymbolSize, WritingMode};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineLabelOptions {
    /// Flip labels that would otherwise read upside down.
    pub keep_upright: bool,
    pub rotate_to_line: bool,
    /// Lay glyphs out on the map plane instead of facing the viewer.
    pub pitch_with_map: bool,
    pub rotate_with_map: bool,
}

impl Default for LineLabelOptions {
    fn default() -> Self {
        Self {
            keep_upright: true,
            rotate_to_line: true,
            pitch_with_map: false,
            rotate_with_map: true,
        }
    }
}

/// What happened to one symbol this frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    Placed,
    /// Placed with its glyph order reversed to stay upright.
    Flipped,
    /// Collided, or a vertical rendition nobody asked for.
    Hidden,
    /// Anchor off screen or behind the camera.
    OutOfView,
    NotEnoughRoom,
    /// Hidden in favour of its vertical rendition.
    UseVertical,
}

impl LabelOutcome {
    pub fn is_visible(self) -> bool {
        matches!(self, LabelOutcome::Placed | LabelOutcome::Flipped)
    }
}

/// The line labels of one tile.
#[derive(Debug, Clone, Copy)]
pub struct LineLabelBatch<'a> {
    pub tile: OverscaledTileId,
    pub symbols: &'a [PlacedSymbol],
    pub line_vertices: &'a [LineVertex],
    pub size: SymbolSize,
    /// Pixel translation of the whole layer.
    pub translate: DVec2,
    pub translate_anchor: TranslateAnchor,
}

impl LineLabelBatch<'_> {
    fn glyph_count(&self) -> usize {
        self.symbols
            .iter()
            .map(|s| s.glyph_start_index + s.glyph_count())
            .max()
            .unwrap_or(0)
    }
}

/// Recomputes the dynamic glyph vertices of every line label in `batch`.
///
/// Horizontal symbols are placed first; a vertical symbol is only shown
/// when the horizontal symbol linking to it asked for it. Every glyph not
/// placed is written as hidden.
pub fn update_line_labels<'a>(
    model: &'a dyn ProjectionModel,
    batch: &LineLabelBatch<'_>,
    options: &LineLabelOptions,
    elevation: Option<&'a ElevationFn<'a>>,
    stream: &mut DynamicVertexStream,
) -> Vec<LabelOutcome> {
    stream.reset(batch.glyph_count());

    let translation = model.translate_position(&batch.tile, batch.translate, batch.translate_anchor);
    let projector = if options.pitch_with_map {
        LabelPlaneProjector::pitched(model, batch.tile, options.rotate_with_map)
    } else {
        LabelPlaneProjector::viewport(model, batch.tile)
    };
    let mut projector = projector.with_translation(translation);
    if let Some(elevation) = elevation {
        projector = projector.with_elevation(elevation);
    }
    let pass = LabelPass {
        projector: &projector,
        batch,
        options,
        camera_to_center_distance: model.camera().camera_to_center_distance(),
        aspect_ratio: model.camera().aspect(),
        buffer: clipping_buffer(model.camera().width(), model.camera().height()),
    };

    let mut outcomes = vec![LabelOutcome::Hidden; batch.symbols.len()];
    let mut wanted_vertical = vec![false; batch.symbols.len()];
    for (i, symbol) in batch.symbols.iter().enumerate() {
        if symbol.writing_mode != WritingMode::Horizontal {
            continue;
        }
        outcomes[i] = pass.place(symbol, stream);
        if outcomes[i] == LabelOutcome::UseVertical
            && let Some(v) = symbol.vertical_alternative
            && let Some(slot) = wanted_vertical.get_mut(v)
        {
            *slot = true;
        }
    }
    for (i, symbol) in batch.symbols.iter().enumerate() {
        if symbol.writing_mode != WritingMode::Vertical {
            continue;
        }
        outcomes[i] = if wanted_vertical[i] {
            pass.place(symbol, stream)
        } else {
            stream.hide_glyphs(symbol.glyph_start_index, symbol.glyph_count());
            LabelOutcome::Hidden
        };
    }

    trace!(
        tile = %batch.tile,
        symbols = batch.symbols.len(),
        visible = outcomes.iter().filter(|o| o.is_visible()).count(),
        "line labels updated"
    );
    outcomes
}

struct LabelPass<'p, 'b> {
    projector: &'p LabelPlaneProjector<'p>,
    batch: &'b LineLabelBatch<'b>,
    options: &'b LineLabelOptions,
    camera_to_center_distance: f64,
    aspect_ratio: f64,
    buffer: DVec2,
}

impl LabelPass<'_, '_> {
    fn place(&self, symbol: &PlacedSymbol, stream: &mut DynamicVertexStream) -> LabelOutcome {
        let outcome = self.try_place(symbol, stream);
        if !outcome.is_visible() {
            stream.hide_glyphs(symbol.glyph_start_index, symbol.glyph_count());
        }
        outcome
    }

    fn try_place(&self, symbol: &PlacedSymbol, stream: &mut DynamicVertexStream) -> LabelOutcome {
        if symbol.hidden {
            return LabelOutcome::Hidden;
        }
        let anchor = self.projector.project_to_clip(symbol.anchor);
        if anchor.signed_distance_from_camera <= 0.0
            || anchor.is_occluded
            || !is_in_padded_viewport(anchor.point, self.buffer)
        {
            return LabelOutcome::OutOfView;
        }

        let ratio = perspective_ratio(
            self.camera_to_center_distance,
            anchor.signed_distance_from_camera,
        );
        let font_size = self.batch.size.evaluate(symbol);
        let pitch_scaled = if self.options.pitch_with_map {
            font_size / ratio
        } else {
            font_size * ratio
        };
        let mut params = GlyphParams {
            font_size: pitch_scaled,
            flip: false,
            keep_upright: self.options.keep_upright,
            aspect_ratio: self.aspect_ratio,
            rotate_to_line: self.options.rotate_to_line,
        };

        let mut cache = ProjectionCache::new();
        let vertices = self.batch.line_vertices;
        match place_glyphs_along_line(self.projector, &mut cache, symbol, vertices, &params) {
            GlyphPlacement::Placed(glyphs) => {
                write_glyphs(stream, symbol, &glyphs);
                LabelOutcome::Placed
            }
            GlyphPlacement::NotEnoughRoom => LabelOutcome::NotEnoughRoom,
            GlyphPlacement::Reorient(OrientationChange::UseVertical) => LabelOutcome::UseVertical,
            GlyphPlacement::Reorient(OrientationChange::NeedsFlip) => {
                params.flip = true;
                match place_glyphs_along_line(self.projector, &mut cache, symbol, vertices, &params) {
                    GlyphPlacement::Placed(glyphs) => {
                        write_glyphs(stream, symbol, &glyphs);
                        LabelOutcome::Flipped
                    }
                    _ => LabelOutcome::NotEnoughRoom,
                }
            }
        }
    }
}

fn write_glyphs(stream: &mut DynamicVertexStream, symbol: &PlacedSymbol, glyphs: &[PlacedGlyph]) {
    for (i, glyph) in glyphs.iter().enumerate() {
        stream.write_glyph(symbol.glyph_start_index + i, glyph.point, glyph.angle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use projection::flat::FlatProjection;
    use runtime::frame::Frame;
    use scene::camera::{CameraConstraints, CameraState, LngLat};
    use streaming::tile::TileCoord;

    use crate::symbol::{DynamicGlyphVertex, ONE_EM};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    /// Zoom 1 over a 1024x512 viewport: tile 1/1/1 starts at screen center
    /// and 16 tile units make a pixel.
    fn flat() -> FlatProjection {
        let mut cam = CameraState::new(CameraConstraints::default(), 1024.0, 512.0);
        cam.set_center(LngLat::new(0.0, 0.0));
        cam.set_zoom(1.0);
        let mut flat = FlatProjection::new(&cam);
        flat.update_projection(&cam, Frame::new(0, 1.0 / 60.0)).unwrap();
        flat
    }

    fn tile() -> OverscaledTileId {
        OverscaledTileId::new(1, 0, TileCoord::new(1, 1, 1))
    }

    fn symbol(anchor: [f64; 2], glyph_start: usize, mode: WritingMode) -> PlacedSymbol {
        PlacedSymbol {
            anchor: DVec2::from(anchor),
            writing_mode: mode,
            glyph_offsets: vec![-1.0, 0.0, 1.0],
            glyph_start_index: glyph_start,
            line_start_index: 0,
            line_length: 3,
            segment: 0,
            line_offset: DVec2::ZERO,
            lower_size: ONE_EM,
            upper_size: ONE_EM,
            hidden: false,
            vertical_alternative: None,
        }
    }

    fn batch<'a>(symbols: &'a [PlacedSymbol], vertices: &'a [LineVertex]) -> LineLabelBatch<'a> {
        LineLabelBatch {
            tile: tile(),
            symbols,
            line_vertices: vertices,
            size: SymbolSize::Constant { size: ONE_EM },
            translate: DVec2::ZERO,
            translate_anchor: TranslateAnchor::Map,
        }
    }

    fn glyph_x(stream: &DynamicVertexStream, glyph: usize) -> f64 {
        f64::from(stream.glyph(glyph).unwrap().position[0])
    }

    const EASTWARD: [LineVertex; 3] = [[0, 1600], [3200, 1600], [6400, 1600]];
    const WESTWARD: [LineVertex; 3] = [[6400, 1600], [3200, 1600], [0, 1600]];
    const SOUTHWARD: [LineVertex; 3] = [[1600, 0], [1600, 3200], [1600, 6400]];

    #[test]
    fn labels_follow_the_line_on_screen() {
        let model = flat();
        let symbols = [symbol([1600.0, 1600.0], 0, WritingMode::Horizontal)];
        let mut stream = DynamicVertexStream::new();
        let outcomes = update_line_labels(
            &model,
            &batch(&symbols, &EASTWARD),
            &LineLabelOptions::default(),
            None,
            &mut stream,
        );
        assert_eq!(outcomes, vec![LabelOutcome::Placed]);
        assert_eq!(stream.vertices().len(), 12);
        for (glyph, x) in [(0, 611.0), (1, 612.0), (2, 613.0)] {
            assert_close(glyph_x(&stream, glyph), x, 1e-3);
            let v = stream.glyph(glyph).unwrap();
            assert_close(f64::from(v.position[1]), 356.0, 1e-3);
            // Glyphs left of the anchor carry a full turn.
            assert_close(f64::from(v.angle).cos(), 1.0, 1e-6);
        }
    }

    #[test]
    fn backwards_lines_are_flipped() {
        let model = flat();
        let symbols = [symbol([4800.0, 1600.0], 0, WritingMode::Horizontal)];
        let mut stream = DynamicVertexStream::new();
        let outcomes = update_line_labels(
            &model,
            &batch(&symbols, &WESTWARD),
            &LineLabelOptions::default(),
            None,
            &mut stream,
        );
        assert_eq!(outcomes, vec![LabelOutcome::Flipped]);
        assert!(glyph_x(&stream, 0) < glyph_x(&stream, 2));

        // Without keep-upright the label simply reads backwards.
        let options = LineLabelOptions {
            keep_upright: false,
            ..LineLabelOptions::default()
        };
        let outcomes = update_line_labels(&model, &batch(&symbols, &WESTWARD), &options, None, &mut stream);
        assert_eq!(outcomes, vec![LabelOutcome::Placed]);
        assert!(glyph_x(&stream, 0) > glyph_x(&stream, 2));
    }

    #[test]
    fn steep_labels_switch_to_their_vertical_rendition() {
        let model = flat();
        let mut horizontal = symbol([1600.0, 1600.0], 0, WritingMode::Horizontal);
        horizontal.vertical_alternative = Some(1);
        let vertical = symbol([1600.0, 1600.0], 3, WritingMode::Vertical);
        let symbols = [horizontal, vertical];
        let mut stream = DynamicVertexStream::new();
        let outcomes = update_line_labels(
            &model,
            &batch(&symbols, &SOUTHWARD),
            &LineLabelOptions::default(),
            None,
            &mut stream,
        );
        assert_eq!(outcomes, vec![LabelOutcome::UseVertical, LabelOutcome::Flipped]);
        assert!((0..3).all(|g| stream.glyph(g).unwrap().is_hidden()));
        assert!((3..6).all(|g| !stream.glyph(g).unwrap().is_hidden()));
    }

    #[test]
    fn vertical_renditions_stay_hidden_unless_requested() {
        let model = flat();
        let mut horizontal = symbol([1600.0, 1600.0], 0, WritingMode::Horizontal);
        horizontal.vertical_alternative = Some(1);
        let vertical = symbol([1600.0, 1600.0], 3, WritingMode::Vertical);
        let symbols = [horizontal, vertical];
        let mut stream = DynamicVertexStream::new();
        let outcomes = update_line_labels(
            &model,
            &batch(&symbols, &EASTWARD),
            &LineLabelOptions::default(),
            None,
            &mut stream,
        );
        assert_eq!(outcomes, vec![LabelOutcome::Placed, LabelOutcome::Hidden]);
        assert!((3..6).all(|g| stream.glyph(g).unwrap().is_hidden()));
    }

    #[test]
    fn unplaceable_symbols_write_the_hidden_sentinel() {
        let model = flat();
        let mut collided = symbol([1600.0, 1600.0], 0, WritingMode::Horizontal);
        collided.hidden = true;
        let offscreen = symbol([-40000.0, 1600.0], 3, WritingMode::Horizontal);
        let mut crowded = symbol([1600.0, 1600.0], 6, WritingMode::Horizontal);
        crowded.glyph_offsets = vec![-200.0, 200.0];
        let symbols = [collided, offscreen, crowded];
        let mut stream = DynamicVertexStream::new();
        let outcomes = update_line_labels(
            &model,
            &batch(&symbols, &EASTWARD),
            &LineLabelOptions::default(),
            None,
            &mut stream,
        );
        assert_eq!(
            outcomes,
            vec![
                LabelOutcome::Hidden,
                LabelOutcome::OutOfView,
                LabelOutcome::NotEnoughRoom
            ]
        );
        assert_eq!(stream.vertices().len(), 8 * 4);
        assert!(stream.vertices().iter().all(|v| *v == DynamicGlyphVertex::HIDDEN));
    }

    #[test]
    fn map_translation_moves_the_label() {
        let model = flat();
        let symbols = [symbol([1600.0, 1600.0], 0, WritingMode::Horizontal)];
        let mut translated = batch(&symbols, &EASTWARD);
        translated.translate = DVec2::new(10.0, 0.0);
        let mut stream = DynamicVertexStream::new();
        update_line_labels(&model, &translated, &LineLabelOptions::default(), None, &mut stream);
        assert_close(glyph_x(&stream, 1), 622.0, 1e-3);
    }

    #[test]
    fn pitched_labels_use_map_pixels() {
        let model = flat();
        let symbols = [symbol([1600.0, 1600.0], 0, WritingMode::Horizontal)];
        let options = LineLabelOptions {
            pitch_with_map: true,
            ..LineLabelOptions::default()
        };
        let mut stream = DynamicVertexStream::new();
        let outcomes =
            update_line_labels(&model, &batch(&symbols, &EASTWARD), &options, None, &mut stream);
        assert_eq!(outcomes, vec![LabelOutcome::Placed]);
        assert_close(glyph_x(&stream, 1), 1600.0 / 16.0, 1e-3);
        assert_close(glyph_x(&stream, 2), 1600.0 / 16.0 + 1.0, 1e-3);
    }

    #[test]
    fn options_default_when_missing() {
        let options: LineLabelOptions = serde_json::from_str(r#"{"pitch_with_map": true}"#).unwrap();
        assert!(options.pitch_with_map);
        assert!(options.keep_upright);
        assert!(options.rotate_to_line);
    }
}
