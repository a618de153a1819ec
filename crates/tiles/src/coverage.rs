//! Coverage queries: exact partition of a destination rect into tile quads.
//!
//! A coverage query walks the cells of a tiling intersecting a destination
//! rect (given in destination space at a destination scale) and yields one
//! geometry rect per cell, trimmed so the produced rects partition the query
//! rect exactly — no gaps, no overlaps — even when enclosing-rect scaling
//! rounds neighbouring cells onto the same destination pixel.

use std::rc::Rc;

use terrazzo_geometry::Rect;

use crate::tile::Tile;
use crate::tiling::Tiling;

/// One entry of a coverage query.
#[derive(Debug)]
pub struct TileCoverage<'a> {
    /// The covered portion of the query rect, in destination space.
    pub geometry_rect: Rect,
    /// The tile covering it, if the cell is populated.
    pub tile: Option<&'a Rc<Tile>>,
}

/// Finite cursor yielding the coverage of `dest_rect` by a tiling.
///
/// Restartable only by constructing a new iterator.
pub struct CoverageIterator<'a> {
    tiling: &'a Tiling,
    dest_rect: Rect,
    dest_to_content_scale: f32,

    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    tile_i: i32,
    tile_j: i32,
    last_geometry_rect: Rect,
    started: bool,
}

impl<'a> CoverageIterator<'a> {
    /// Cover `dest_rect`, expressed at `dest_scale`, with tiles from
    /// `tiling`. An empty or non-finite query yields nothing.
    pub fn new(tiling: &'a Tiling, dest_scale: f32, dest_rect: Rect) -> Self {
        let mut iter = Self {
            tiling,
            dest_rect,
            dest_to_content_scale: 0.0,
            left: 0,
            top: 0,
            right: -1,
            bottom: -1,
            tile_i: 0,
            tile_j: 0,
            last_geometry_rect: Rect::default(),
            started: false,
        };

        if dest_rect.is_empty() || !dest_scale.is_finite() || dest_scale <= 0.0 {
            iter.tile_j = 1; // past `bottom`, immediately exhausted
            return iter;
        }

        iter.dest_to_content_scale = tiling.contents_scale() / dest_scale;

        let content_rect = dest_rect
            .scale_to_enclosing(iter.dest_to_content_scale)
            .intersect(&Rect::from_size(tiling.tiling_size()));
        if content_rect.is_empty() {
            iter.tile_j = 1;
            return iter;
        }

        let grid = tiling.grid();
        iter.left = grid.x_index_from_coord(content_rect.x());
        iter.top = grid.y_index_from_coord(content_rect.y());
        iter.right = grid.x_index_from_coord(content_rect.right() - 1);
        iter.bottom = grid.y_index_from_coord(content_rect.bottom() - 1);
        iter.tile_i = iter.left - 1;
        iter.tile_j = iter.top;
        iter
    }
}

impl<'a> Iterator for CoverageIterator<'a> {
    type Item = TileCoverage<'a>;

    fn next(&mut self) -> Option<TileCoverage<'a>> {
        if self.tile_j > self.bottom {
            return None;
        }

        let first_time = !self.started;
        self.started = true;
        let mut new_row = false;
        self.tile_i += 1;
        if self.tile_i > self.right {
            self.tile_i = self.left;
            self.tile_j += 1;
            new_row = true;
            if self.tile_j > self.bottom {
                return None;
            }
        }

        let content_rect = self.tiling.grid().tile_bounds(self.tile_i, self.tile_j);
        let mut geometry_rect = content_rect
            .scale_to_enclosing(1.0 / self.dest_to_content_scale)
            .intersect(&self.dest_rect);

        // Enclosing-rect scaling can make neighbouring cells overlap by a
        // destination pixel; trim against the previously yielded rect so the
        // partition stays exact.
        if !first_time {
            let (min_left, min_top) = if new_row {
                (self.dest_rect.x(), self.last_geometry_rect.bottom())
            } else {
                (self.last_geometry_rect.right(), self.last_geometry_rect.y())
            };
            let inset_left = (min_left - geometry_rect.x()).max(0);
            let inset_top = (min_top - geometry_rect.y()).max(0);
            geometry_rect = geometry_rect.inset(inset_left, inset_top, 0, 0);
        }

        self.last_geometry_rect = geometry_rect;

        Some(TileCoverage {
            geometry_rect,
            tile: self.tiling.tile_at(self.tile_i, self.tile_j),
        })
    }
}
