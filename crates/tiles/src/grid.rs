//! Tile grid index math.
//!
//! A `TileGrid` partitions a content area into fixed-size cells and answers
//! index/bounds queries. Iteration over rects is provided by explicit, finite
//! cursors; restarting an iteration means constructing a fresh cursor.

use terrazzo_geometry::{Rect, Size};

/// Grid cell key: column and row indices.
pub type CellKey = (i32, i32);

/// A fixed-size cell partition of a content area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    tiling_size: Size,
    tile_size: Size,
}

impl TileGrid {
    /// Create a grid covering `tiling_size` with `tile_size` cells.
    ///
    /// Tile dimensions are clamped to at least one pixel.
    pub fn new(tiling_size: Size, tile_size: Size) -> Self {
        Self {
            tiling_size,
            tile_size: Size::new(tile_size.width.max(1), tile_size.height.max(1)),
        }
    }

    pub fn tiling_size(&self) -> Size {
        self.tiling_size
    }

    pub fn tile_size(&self) -> Size {
        self.tile_size
    }

    /// Replace the covered area, keeping the cell size.
    pub fn set_tiling_size(&mut self, tiling_size: Size) {
        self.tiling_size = tiling_size;
    }

    /// Number of columns.
    pub fn num_tiles_x(&self) -> i32 {
        div_ceil(self.tiling_size.width, self.tile_size.width)
    }

    /// Number of rows.
    pub fn num_tiles_y(&self) -> i32 {
        div_ceil(self.tiling_size.height, self.tile_size.height)
    }

    /// True if the grid covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.tiling_size.is_empty()
    }

    /// The bounds of cell `(i, j)`, clamped to the tiling edge.
    ///
    /// Out-of-range indices produce an empty rect.
    pub fn tile_bounds(&self, i: i32, j: i32) -> Rect {
        if i < 0 || j < 0 || i >= self.num_tiles_x() || j >= self.num_tiles_y() {
            return Rect::default();
        }
        let x = i * self.tile_size.width;
        let y = j * self.tile_size.height;
        let width = self.tile_size.width.min(self.tiling_size.width - x);
        let height = self.tile_size.height.min(self.tiling_size.height - y);
        Rect::new(x, y, width, height)
    }

    /// Column index containing the x coordinate, clamped to valid columns.
    pub fn x_index_from_coord(&self, x: i32) -> i32 {
        (x.div_euclid(self.tile_size.width)).clamp(0, (self.num_tiles_x() - 1).max(0))
    }

    /// Row index containing the y coordinate, clamped to valid rows.
    pub fn y_index_from_coord(&self, y: i32) -> i32 {
        (y.div_euclid(self.tile_size.height)).clamp(0, (self.num_tiles_y() - 1).max(0))
    }

    /// Cursor over all cells intersecting `rect` (clamped to the grid),
    /// left-to-right then top-to-bottom.
    pub fn iter_rect(&self, rect: Rect) -> GridIter {
        GridIter::new(self, rect)
    }

    /// Cursor over cells intersecting `include` but not `exclude`.
    pub fn iter_difference(&self, include: Rect, exclude: Rect) -> GridDifferenceIter {
        GridDifferenceIter {
            inner: self.iter_rect(include),
            exclude_cells: self.cell_span(exclude),
        }
    }

    /// The inclusive index span of cells intersecting `rect`, if any.
    fn cell_span(&self, rect: Rect) -> Option<(i32, i32, i32, i32)> {
        let clamped = rect.intersect(&Rect::from_size(self.tiling_size));
        if clamped.is_empty() {
            return None;
        }
        Some((
            self.x_index_from_coord(clamped.x()),
            self.y_index_from_coord(clamped.y()),
            self.x_index_from_coord(clamped.right() - 1),
            self.y_index_from_coord(clamped.bottom() - 1),
        ))
    }
}

fn div_ceil(value: i32, divisor: i32) -> i32 {
    if value <= 0 {
        0
    } else {
        (value + divisor - 1) / divisor
    }
}

/// Finite cursor over the cells of a grid intersecting a rect.
#[derive(Debug, Clone)]
pub struct GridIter {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    next_i: i32,
    next_j: i32,
    done: bool,
}

impl GridIter {
    fn new(grid: &TileGrid, rect: Rect) -> Self {
        match grid.cell_span(rect) {
            Some((left, top, right, bottom)) => Self {
                left,
                top,
                right,
                bottom,
                next_i: left,
                next_j: top,
                done: false,
            },
            None => Self {
                left: 0,
                top: 0,
                right: -1,
                bottom: -1,
                next_i: 0,
                next_j: 0,
                done: true,
            },
        }
    }
}

impl Iterator for GridIter {
    type Item = CellKey;

    fn next(&mut self) -> Option<CellKey> {
        if self.done || self.next_j > self.bottom {
            return None;
        }
        let cell = (self.next_i, self.next_j);
        self.next_i += 1;
        if self.next_i > self.right {
            self.next_i = self.left;
            self.next_j += 1;
        }
        Some(cell)
    }
}

/// Finite cursor over cells in one rect but not another.
#[derive(Debug, Clone)]
pub struct GridDifferenceIter {
    inner: GridIter,
    exclude_cells: Option<(i32, i32, i32, i32)>,
}

impl Iterator for GridDifferenceIter {
    type Item = CellKey;

    fn next(&mut self) -> Option<CellKey> {
        loop {
            let (i, j) = self.inner.next()?;
            let excluded = match self.exclude_cells {
                Some((left, top, right, bottom)) => {
                    i >= left && i <= right && j >= top && j <= bottom
                }
                None => false,
            };
            if !excluded {
                return Some((i, j));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid = TileGrid::new(Size::new(400, 400), Size::new(100, 100));
        assert_eq!(grid.num_tiles_x(), 4);
        assert_eq!(grid.num_tiles_y(), 4);

        let uneven = TileGrid::new(Size::new(450, 401), Size::new(100, 100));
        assert_eq!(uneven.num_tiles_x(), 5);
        assert_eq!(uneven.num_tiles_y(), 5);

        let empty = TileGrid::new(Size::default(), Size::new(100, 100));
        assert!(empty.is_empty());
        assert_eq!(empty.num_tiles_x(), 0);
    }

    #[test]
    fn test_tile_bounds_clamped_at_edges() {
        let grid = TileGrid::new(Size::new(450, 401), Size::new(100, 100));
        assert_eq!(grid.tile_bounds(0, 0), Rect::new(0, 0, 100, 100));
        assert_eq!(grid.tile_bounds(4, 0), Rect::new(400, 0, 50, 100));
        assert_eq!(grid.tile_bounds(0, 4), Rect::new(0, 400, 100, 1));
        assert!(grid.tile_bounds(5, 0).is_empty());
        assert!(grid.tile_bounds(-1, 0).is_empty());
    }

    #[test]
    fn test_index_from_coord() {
        let grid = TileGrid::new(Size::new(400, 400), Size::new(100, 100));
        assert_eq!(grid.x_index_from_coord(0), 0);
        assert_eq!(grid.x_index_from_coord(99), 0);
        assert_eq!(grid.x_index_from_coord(100), 1);
        assert_eq!(grid.x_index_from_coord(399), 3);
        // Clamped beyond the grid.
        assert_eq!(grid.x_index_from_coord(1000), 3);
        assert_eq!(grid.x_index_from_coord(-50), 0);
    }

    #[test]
    fn test_iter_rect_covers_exact_cells() {
        let grid = TileGrid::new(Size::new(400, 400), Size::new(100, 100));
        let cells: Vec<_> = grid.iter_rect(Rect::new(0, 0, 400, 400)).collect();
        assert_eq!(cells.len(), 16);
        assert_eq!(cells[0], (0, 0));
        assert_eq!(cells[15], (3, 3));

        let partial: Vec<_> = grid.iter_rect(Rect::new(150, 150, 100, 100)).collect();
        assert_eq!(partial, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_iter_rect_outside_grid_is_empty() {
        let grid = TileGrid::new(Size::new(400, 400), Size::new(100, 100));
        assert_eq!(grid.iter_rect(Rect::new(500, 500, 100, 100)).count(), 0);
        assert_eq!(grid.iter_rect(Rect::default()).count(), 0);
    }

    #[test]
    fn test_iter_rect_clamps_to_grid() {
        let grid = TileGrid::new(Size::new(200, 200), Size::new(100, 100));
        let cells: Vec<_> = grid.iter_rect(Rect::new(-100, -100, 1000, 150)).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn test_iter_difference() {
        let grid = TileGrid::new(Size::new(400, 400), Size::new(100, 100));
        let cells: Vec<_> = grid
            .iter_difference(Rect::new(0, 0, 400, 400), Rect::new(0, 0, 200, 200))
            .collect();
        assert_eq!(cells.len(), 12);
        assert!(!cells.contains(&(0, 0)));
        assert!(!cells.contains(&(1, 1)));
        assert!(cells.contains(&(2, 0)));
        assert!(cells.contains(&(0, 2)));
    }

    #[test]
    fn test_iter_difference_with_empty_exclude() {
        let grid = TileGrid::new(Size::new(200, 200), Size::new(100, 100));
        let cells: Vec<_> = grid
            .iter_difference(Rect::new(0, 0, 200, 200), Rect::default())
            .collect();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_cells_partition_without_gaps_or_overlaps() {
        let grid = TileGrid::new(Size::new(430, 370), Size::new(128, 128));
        let mut covered = 0i64;
        for j in 0..grid.num_tiles_y() {
            for i in 0..grid.num_tiles_x() {
                covered += grid.tile_bounds(i, j).area();
            }
        }
        assert_eq!(covered, 430 * 370);
    }
}
