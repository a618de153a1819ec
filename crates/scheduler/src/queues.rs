//! Raster and eviction ordering over the live tile set.
//!
//! Both queues are rebuilt from scratch each scheduling pass from the same
//! per-tile priorities, so they can never contradict each other: the
//! eviction order is the exact reverse of the raster order, with
//! required-for-activation tiles excluded from eviction entirely.
//!
//! The queues are explicit cursors — finite, bounded by the tile count, and
//! restartable only by rebuilding.

use std::cmp::Ordering;
use std::rc::Rc;

use terrazzo_tiles::{PriorityBin, Tile, TreePriority};

/// Tiles in the order they should be rasterized this pass.
///
/// All NOW tiles (any resolution) come first, ordered by increasing
/// distance-to-visible, then SOON high-resolution tiles only — lower
/// resolutions are never prefetched, which bounds prefetch cost to the
/// resolution that will actually be drawn. Occluded tiles are demoted within
/// their bin but stay eligible for leftover budget.
pub struct RasterQueue {
    tiles: Vec<Rc<Tile>>,
    next: usize,
}

impl RasterQueue {
    /// Build the queue for one pass.
    pub fn new(tiles: &[Rc<Tile>], tree_priority: TreePriority) -> Self {
        let mut ordered: Vec<Rc<Tile>> = tiles
            .iter()
            .filter(|tile| {
                if tile.is_ready_to_draw() {
                    return false;
                }
                let priority = tile.priority_for_tree_priority(tree_priority);
                match priority.bin {
                    PriorityBin::Now => true,
                    PriorityBin::Soon => {
                        priority.resolution == terrazzo_tiles::TileResolution::HighResolution
                    }
                    PriorityBin::Eventually => false,
                }
            })
            .cloned()
            .collect();

        ordered.sort_by(|a, b| raster_order(a, b, tree_priority));
        Self {
            tiles: ordered,
            next: 0,
        }
    }

    /// The tile that would be returned by `pop`, if any.
    pub fn peek(&self) -> Option<&Rc<Tile>> {
        self.tiles.get(self.next)
    }

    /// Advance the cursor and return the next tile.
    pub fn pop(&mut self) -> Option<Rc<Tile>> {
        let tile = self.tiles.get(self.next).cloned()?;
        self.next += 1;
        Some(tile)
    }

    pub fn is_empty(&self) -> bool {
        self.next >= self.tiles.len()
    }

    pub fn remaining(&self) -> usize {
        self.tiles.len() - self.next
    }
}

impl Iterator for RasterQueue {
    type Item = Rc<Tile>;

    fn next(&mut self) -> Option<Rc<Tile>> {
        self.pop()
    }
}

/// Tiles in the order they should be evicted this pass: the exact reverse
/// priority order. Lowest bin first, occluded before unoccluded, farthest
/// first. Tiles flagged required-for-activation are never yielded.
pub struct EvictionQueue {
    tiles: Vec<Rc<Tile>>,
    next: usize,
}

impl EvictionQueue {
    /// Build the queue for one pass. Only tiles holding pool resources are
    /// candidates — solid-color and unrasterized tiles occupy no memory.
    pub fn new(tiles: &[Rc<Tile>], tree_priority: TreePriority) -> Self {
        let mut ordered: Vec<Rc<Tile>> = tiles
            .iter()
            .filter(|tile| tile.has_resource() && !tile.required_for_activation())
            .cloned()
            .collect();

        ordered.sort_by(|a, b| raster_order(a, b, tree_priority).reverse());
        Self {
            tiles: ordered,
            next: 0,
        }
    }

    pub fn peek(&self) -> Option<&Rc<Tile>> {
        self.tiles.get(self.next)
    }

    pub fn pop(&mut self) -> Option<Rc<Tile>> {
        let tile = self.tiles.get(self.next).cloned()?;
        self.next += 1;
        Some(tile)
    }

    pub fn is_empty(&self) -> bool {
        self.next >= self.tiles.len()
    }

    pub fn remaining(&self) -> usize {
        self.tiles.len() - self.next
    }
}

impl Iterator for EvictionQueue {
    type Item = Rc<Tile>;

    fn next(&mut self) -> Option<Rc<Tile>> {
        self.pop()
    }
}

/// Total order for raster urgency under a tree-priority mode.
///
/// The dominating tree is interleaved first implicitly: the sort key is the
/// priority the mode selects. Remaining ties break by resolution (high
/// before low) and then by tile id for determinism.
fn raster_order(a: &Rc<Tile>, b: &Rc<Tile>, tree_priority: TreePriority) -> Ordering {
    let pa = a.priority_for_tree_priority(tree_priority);
    let pb = b.priority_for_tree_priority(tree_priority);

    pa.bin
        .cmp(&pb.bin)
        .then_with(|| {
            let oa = a.is_occluded_for_tree_priority(tree_priority);
            let ob = b.is_occluded_for_tree_priority(tree_priority);
            oa.cmp(&ob)
        })
        .then_with(|| {
            pa.distance_to_visible
                .partial_cmp(&pb.distance_to_visible)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| pa.resolution.rank().cmp(&pb.resolution.rank()))
        .then_with(|| a.id().cmp(&b.id()))
}
