//! The tiling set: all resolutions maintained for one layer.
//!
//! Holds the tilings in descending scale order, enforces the one-high-res /
//! one-low-res invariant, runs the cleanup pass, and answers cross-scale
//! coverage queries for draw-quad emission (falling back to other
//! resolutions where the preferred tiling has no ready tile).

use std::rc::Rc;

use terrazzo_geometry::{Rect, Size};
use terrazzo_tiles::{
    CoverageIterator, LayerId, Tile, TileResolution, Tiling, TilingParams, WhichTree,
};

use crate::config::{scales_equal, TilingConfig};
use crate::TilingError;

/// One entry of a cross-scale coverage query. Owning variant of the
/// single-tiling coverage entry so the cursor can outlive the per-tiling
/// iterators.
#[derive(Debug, Clone)]
pub struct CoverageEntry {
    /// The covered portion of the query rect, in destination space.
    pub geometry_rect: Rect,
    /// The ready tile covering it; `None` yields a placeholder quad.
    pub tile: Option<Rc<Tile>>,
}

/// Finite cursor over a cross-scale coverage; restart by re-querying.
pub struct TilingSetCoverage {
    entries: Vec<CoverageEntry>,
    next: usize,
}

impl TilingSetCoverage {
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.next
    }
}

impl Iterator for TilingSetCoverage {
    type Item = CoverageEntry;

    fn next(&mut self) -> Option<CoverageEntry> {
        let entry = self.entries.get(self.next).cloned()?;
        self.next += 1;
        Some(entry)
    }
}

/// The set of tilings (high-res, low-res, non-ideal) for one layer.
pub struct TilingSet {
    layer_id: LayerId,
    tree: WhichTree,
    layer_bounds: Size,
    config: TilingConfig,
    layer_is_opaque: bool,
    has_text: bool,
    tilings: Vec<Tiling>,
}

impl TilingSet {
    /// Create an empty set for a layer.
    ///
    /// Refused up front for invalid geometry: callers must check the
    /// can-have-tilings predicate before building a set.
    pub fn new(
        layer_id: LayerId,
        tree: WhichTree,
        layer_bounds: Size,
        config: TilingConfig,
        layer_is_opaque: bool,
        has_text: bool,
    ) -> Result<Self, TilingError> {
        if layer_bounds.is_empty() {
            return Err(TilingError::EmptyLayerBounds);
        }
        Ok(Self {
            layer_id,
            tree,
            layer_bounds,
            config,
            layer_is_opaque,
            has_text,
            tilings: Vec::new(),
        })
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn tree(&self) -> WhichTree {
        self.tree
    }

    pub fn layer_bounds(&self) -> Size {
        self.layer_bounds
    }

    pub fn num_tilings(&self) -> usize {
        self.tilings.len()
    }

    pub fn tiling_at_index(&self, index: usize) -> Option<&Tiling> {
        self.tilings.get(index)
    }

    /// All tilings, in descending scale order.
    pub fn tilings(&self) -> impl Iterator<Item = &Tiling> {
        self.tilings.iter()
    }

    pub fn tilings_mut(&mut self) -> impl Iterator<Item = &mut Tiling> {
        self.tilings.iter_mut()
    }

    /// Exact-scale lookup with numeric-epsilon tolerance.
    pub fn tiling_at_scale(&self, scale: f32) -> Option<&Tiling> {
        self.tilings
            .iter()
            .find(|tiling| scales_equal(tiling.contents_scale(), scale))
    }

    pub fn tiling_at_scale_mut(&mut self, scale: f32) -> Option<&mut Tiling> {
        self.tilings
            .iter_mut()
            .find(|tiling| scales_equal(tiling.contents_scale(), scale))
    }

    /// The tiling tagged high-resolution, if any.
    pub fn high_res_tiling(&self) -> Option<&Tiling> {
        self.tilings
            .iter()
            .find(|tiling| tiling.resolution() == TileResolution::HighResolution)
    }

    /// The tiling tagged low-resolution, if any.
    pub fn low_res_tiling(&self) -> Option<&Tiling> {
        self.tilings
            .iter()
            .find(|tiling| tiling.resolution() == TileResolution::LowResolution)
    }

    /// Add a tiling at `contents_scale`.
    ///
    /// The new tiling starts as NON_IDEAL; resolution tags are assigned by
    /// the owner afterwards.
    pub fn add_tiling(&mut self, contents_scale: f32) -> Result<&mut Tiling, TilingError> {
        if !contents_scale.is_finite() || contents_scale <= 0.0 {
            return Err(TilingError::InvalidScale(contents_scale));
        }
        if self.layer_bounds.scale_ceil(contents_scale).is_empty() {
            return Err(TilingError::InvalidScale(contents_scale));
        }
        if self.tiling_at_scale(contents_scale).is_some() {
            return Err(TilingError::DuplicateScale(contents_scale));
        }

        let content_bounds = self.layer_bounds.scale_ceil(contents_scale);
        let tiling = Tiling::new(TilingParams {
            layer_id: self.layer_id,
            tree: self.tree,
            contents_scale,
            layer_bounds: self.layer_bounds,
            tile_size: self.config.tile_size_for(content_bounds),
            layer_is_opaque: self.layer_is_opaque,
            has_text: self.has_text,
        });

        let position = self
            .tilings
            .iter()
            .position(|existing| existing.contents_scale() < contents_scale)
            .unwrap_or(self.tilings.len());
        self.tilings.insert(position, tiling);
        Ok(&mut self.tilings[position])
    }

    /// Tag the tiling at `scale` high-resolution, demoting any previous
    /// holder to NON_IDEAL. At most one tiling carries the tag.
    pub fn mark_high_res(&mut self, scale: f32) {
        for tiling in &mut self.tilings {
            let is_target = scales_equal(tiling.contents_scale(), scale);
            match tiling.resolution() {
                TileResolution::HighResolution if !is_target => {
                    tiling.set_resolution(TileResolution::NonIdeal);
                }
                _ if is_target => tiling.set_resolution(TileResolution::HighResolution),
                _ => {}
            }
        }
    }

    /// Tag the tiling at `scale` low-resolution, demoting any previous
    /// holder to NON_IDEAL.
    pub fn mark_low_res(&mut self, scale: f32) {
        for tiling in &mut self.tilings {
            let is_target = scales_equal(tiling.contents_scale(), scale);
            match tiling.resolution() {
                TileResolution::LowResolution if !is_target => {
                    tiling.set_resolution(TileResolution::NonIdeal);
                }
                _ if is_target => tiling.set_resolution(TileResolution::LowResolution),
                _ => {}
            }
        }
    }

    /// Resize every tiling to new layer bounds.
    pub fn set_layer_bounds(&mut self, layer_bounds: Size) {
        self.layer_bounds = layer_bounds;
        for tiling in &mut self.tilings {
            tiling.set_layer_bounds(layer_bounds);
        }
    }

    /// Re-home the set (and its tilings) to the other tree on activation.
    pub fn set_tree(&mut self, tree: WhichTree) {
        self.tree = tree;
        for tiling in &mut self.tilings {
            tiling.set_tree(tree);
        }
    }

    /// Remove every tiling (full reset on resource loss).
    pub fn remove_all_tilings(&mut self) {
        self.tilings.clear();
    }

    /// Cleanup pass: drop tilings whose scale lies outside the closed
    /// interval between the ideal and raster scales, keeping the designated
    /// low-resolution tiling and any scale in `used_scales` (tilings still
    /// being drawn mid-transition).
    pub fn clean_up(
        &mut self,
        ideal_contents_scale: f32,
        raster_contents_scale: f32,
        used_scales: &[f32],
        low_res_scale: Option<f32>,
    ) {
        let min_scale = ideal_contents_scale.min(raster_contents_scale);
        let max_scale = ideal_contents_scale.max(raster_contents_scale);

        self.tilings.retain(|tiling| {
            let scale = tiling.contents_scale();
            let in_interval = (scale >= min_scale || scales_equal(scale, min_scale))
                && (scale <= max_scale || scales_equal(scale, max_scale));
            let is_low_res = low_res_scale.is_some_and(|low| scales_equal(scale, low))
                || tiling.resolution() == TileResolution::LowResolution;
            let still_used = used_scales.iter().any(|&used| scales_equal(scale, used));
            let keep = in_interval || is_low_res || still_used;
            if !keep {
                log::debug!(
                    "cleanup dropping tiling at scale {} (outside [{}, {}])",
                    scale,
                    min_scale,
                    max_scale
                );
            }
            keep
        });
    }

    /// Cross-scale coverage of `dest_rect` at `dest_scale` for quad
    /// emission.
    ///
    /// The high-resolution tiling is consulted first, remaining tilings in
    /// descending scale order; cells without a ready tile fall through to
    /// the next tiling. Leftover area yields placeholder entries so the
    /// geometric coverage of the query rect stays exact.
    pub fn coverage(&self, dest_scale: f32, dest_rect: Rect) -> TilingSetCoverage {
        let mut entries = Vec::new();

        // The drawable extent of the layer in destination space; anything
        // outside is a placeholder regardless of tilings.
        let dest_layer_rect = Rect::from_size(self.layer_bounds.scale_ceil(dest_scale));
        for outside in rect_difference(dest_rect, dest_layer_rect) {
            entries.push(CoverageEntry {
                geometry_rect: outside,
                tile: None,
            });
        }

        let mut pending = vec![dest_rect.intersect(&dest_layer_rect)];
        pending.retain(|rect| !rect.is_empty());

        for tiling in self.tilings_in_draw_order() {
            if pending.is_empty() {
                break;
            }
            let mut next_pending = Vec::new();
            for rect in pending {
                for coverage in CoverageIterator::new(tiling, dest_scale, rect) {
                    if coverage.geometry_rect.is_empty() {
                        continue;
                    }
                    match coverage.tile {
                        Some(tile) if tile.is_ready_to_draw() => {
                            entries.push(CoverageEntry {
                                geometry_rect: coverage.geometry_rect,
                                tile: Some(Rc::clone(tile)),
                            });
                        }
                        _ => next_pending.push(coverage.geometry_rect),
                    }
                }
            }
            pending = next_pending;
        }

        for hole in pending {
            entries.push(CoverageEntry {
                geometry_rect: hole,
                tile: None,
            });
        }

        TilingSetCoverage { entries, next: 0 }
    }

    /// Tilings in draw preference order: high-res first, then the rest by
    /// descending scale.
    fn tilings_in_draw_order(&self) -> impl Iterator<Item = &Tiling> {
        let high_res = self.high_res_tiling();
        high_res.into_iter().chain(
            self.tilings
                .iter()
                .filter(move |tiling| match high_res {
                    Some(high) => !std::ptr::eq(*tiling, high),
                    None => true,
                }),
        )
    }
}

/// The parts of `rect` not covered by `clip` (at most four rects).
fn rect_difference(rect: Rect, clip: Rect) -> Vec<Rect> {
    let overlap = rect.intersect(&clip);
    if overlap.is_empty() {
        return if rect.is_empty() { Vec::new() } else { vec![rect] };
    }
    if overlap == rect {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    // Above the overlap.
    if overlap.y() > rect.y() {
        pieces.push(Rect::new(
            rect.x(),
            rect.y(),
            rect.width(),
            overlap.y() - rect.y(),
        ));
    }
    // Below the overlap.
    if overlap.bottom() < rect.bottom() {
        pieces.push(Rect::new(
            rect.x(),
            overlap.bottom(),
            rect.width(),
            rect.bottom() - overlap.bottom(),
        ));
    }
    // Left of the overlap.
    if overlap.x() > rect.x() {
        pieces.push(Rect::new(
            rect.x(),
            overlap.y(),
            overlap.x() - rect.x(),
            overlap.height(),
        ));
    }
    // Right of the overlap.
    if overlap.right() < rect.right() {
        pieces.push(Rect::new(
            overlap.right(),
            overlap.y(),
            rect.right() - overlap.right(),
            overlap.height(),
        ));
    }
    pieces
}

impl std::fmt::Debug for TilingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilingSet")
            .field("layer_id", &self.layer_id)
            .field("tree", &self.tree)
            .field("layer_bounds", &self.layer_bounds)
            .field("num_tilings", &self.tilings.len())
            .finish()
    }
}
