//! A single-scale tiling: a sparse grid of tiles over one layer.
//!
//! The tiling owns (shares) tiles for the populated portion of its grid,
//! answers coverage queries, assigns per-pass priorities from the priority
//! viewport, and reuses the twin tree's tiles for uninvalidated cells.

use std::collections::HashMap;
use std::rc::Rc;

use terrazzo_geometry::{Rect, Region, Size};

use crate::grid::{CellKey, TileGrid};
use crate::priority::{PriorityBin, TilePriority, TileResolution, WhichTree};
use crate::tile::{LayerId, Tile, TileInfo};

/// Creates tiles on behalf of a tiling.
///
/// Implemented by the tile manager. Returns `None` when the paint source has
/// no rasterable content for the requested region; the grid cell then stays
/// unpopulated and coverage queries yield a placeholder for it.
pub trait TileFactory {
    fn create_tile(&self, info: TileInfo) -> Option<Rc<Tile>>;
}

/// Opaque content drawn above a layer, used to demote fully covered tiles.
///
/// Occlusion is evaluated independently per tree; a shared tile can be
/// occluded on one tree and visible on the other. Coverage is conservative:
/// only a single opaque rect fully containing the query counts.
#[derive(Debug, Clone, Default)]
pub struct Occlusion {
    opaque_in_layer: Region,
}

impl Occlusion {
    pub fn new(opaque_in_layer: Region) -> Self {
        Self { opaque_in_layer }
    }

    /// True if `layer_rect` is entirely covered by opaque content.
    pub fn is_fully_occluded(&self, layer_rect: &Rect) -> bool {
        self.opaque_in_layer.contains_rect(layer_rect)
    }
}

/// Construction parameters for a tiling.
#[derive(Debug, Clone, Copy)]
pub struct TilingParams {
    pub layer_id: LayerId,
    pub tree: WhichTree,
    pub contents_scale: f32,
    pub layer_bounds: Size,
    pub tile_size: Size,
    pub layer_is_opaque: bool,
    pub has_text: bool,
}

/// Per-pass priority inputs for [`Tiling::update_priorities`].
#[derive(Debug, Clone, Copy)]
pub struct PriorityContext<'a> {
    /// The rect actually being drawn this frame, in layer space.
    pub visible_rect_in_layer: Rect,
    /// The externally supplied rect to prioritize around, in layer space.
    /// May differ from the drawn rect (e.g. during overdraw or pre-scroll).
    pub priority_rect_in_layer: Rect,
    /// The scale content would ideally be drawn at; used to convert content
    /// distances to screen distances.
    pub ideal_contents_scale: f32,
    /// Opaque content above this layer for the tiling's tree.
    pub occlusion: Option<&'a Occlusion>,
    /// Set during invalid or resourceless draw passes: the stored priority
    /// rect is retained so transient draw states cannot thrash priorities.
    pub skip_priority_rect_update: bool,
    /// Distance in screen pixels within which tiles are promoted to SOON.
    pub soon_border_px: f32,
    /// Distance in screen pixels out to which tiles are kept alive as
    /// EVENTUALLY.
    pub interest_border_px: f32,
}

/// A grid of tiles covering one layer at one contents scale.
pub struct Tiling {
    layer_id: LayerId,
    tree: WhichTree,
    contents_scale: f32,
    layer_bounds: Size,
    resolution: TileResolution,
    layer_is_opaque: bool,
    has_text: bool,

    grid: TileGrid,
    tiles: HashMap<CellKey, Rc<Tile>>,

    live_tiles_rect: Rect,
    current_visible_rect: Rect,
    current_priority_rect: Rect,
    current_soon_rect: Rect,
    current_eventually_rect: Rect,
}

impl Tiling {
    /// Create an empty tiling.
    ///
    /// Callers must have validated the layer through the can-have-tilings
    /// predicate: the scale is finite and positive and the scaled bounds are
    /// non-empty.
    pub fn new(params: TilingParams) -> Self {
        debug_assert!(
            params.contents_scale.is_finite() && params.contents_scale > 0.0,
            "tiling created with invalid contents scale"
        );
        let tiling_size = params.layer_bounds.scale_ceil(params.contents_scale);
        Self {
            layer_id: params.layer_id,
            tree: params.tree,
            contents_scale: params.contents_scale,
            layer_bounds: params.layer_bounds,
            resolution: TileResolution::NonIdeal,
            layer_is_opaque: params.layer_is_opaque,
            has_text: params.has_text,
            grid: TileGrid::new(tiling_size, params.tile_size),
            tiles: HashMap::new(),
            live_tiles_rect: Rect::default(),
            current_visible_rect: Rect::default(),
            current_priority_rect: Rect::default(),
            current_soon_rect: Rect::default(),
            current_eventually_rect: Rect::default(),
        }
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn tree(&self) -> WhichTree {
        self.tree
    }

    /// Re-home the tiling to the other tree, e.g. on activation.
    pub fn set_tree(&mut self, tree: WhichTree) {
        self.tree = tree;
    }

    pub fn contents_scale(&self) -> f32 {
        self.contents_scale
    }

    pub fn layer_bounds(&self) -> Size {
        self.layer_bounds
    }

    /// The layer bounds scaled by the contents scale.
    pub fn tiling_size(&self) -> Size {
        self.grid.tiling_size()
    }

    pub fn tile_size(&self) -> Size {
        self.grid.tile_size()
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// The resolution role, assigned externally by the owning tiling set.
    pub fn resolution(&self) -> TileResolution {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: TileResolution) {
        self.resolution = resolution;
    }

    pub fn live_tiles_rect(&self) -> Rect {
        self.live_tiles_rect
    }

    pub fn current_visible_rect(&self) -> Rect {
        self.current_visible_rect
    }

    pub fn current_priority_rect(&self) -> Rect {
        self.current_priority_rect
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Look up an existing tile. Never creates.
    pub fn tile_at(&self, i: i32, j: i32) -> Option<&Rc<Tile>> {
        self.tiles.get(&(i, j))
    }

    /// Iterate over all live tiles.
    pub fn tiles(&self) -> impl Iterator<Item = &Rc<Tile>> {
        self.tiles.values()
    }

    /// Iterate over all live tiles with their grid cells.
    pub fn cells(&self) -> impl Iterator<Item = (CellKey, &Rc<Tile>)> {
        self.tiles.iter().map(|(&key, tile)| (key, tile))
    }

    /// Create (or adopt from the twin) the tile for cell `(i, j)`.
    ///
    /// A cell intersecting the invalidation region always gets a fresh,
    /// unshared tile. Otherwise the twin tree's tile at the same coordinates
    /// and scale is reused and marked shared.
    pub fn create_tile(
        &mut self,
        i: i32,
        j: i32,
        factory: &dyn TileFactory,
        invalidation: &Region,
        twin: Option<&Tiling>,
    ) -> Option<Rc<Tile>> {
        if let Some(existing) = self.tiles.get(&(i, j)) {
            return Some(Rc::clone(existing));
        }

        let content_rect = self.grid.tile_bounds(i, j);
        if content_rect.is_empty() {
            return None;
        }

        // Check the twin for a reusable tile. Geometry must match exactly:
        // edge cells clamp differently when the twins' bounds differ.
        if let Some(twin) = twin {
            if twin.grid.tile_size() == self.grid.tile_size() {
                if let Some(candidate) = twin.tile_at(i, j) {
                    let layer_rect = content_rect.scale_to_enclosing(1.0 / self.contents_scale);
                    if candidate.content_rect() == content_rect
                        && !invalidation.intersects(&layer_rect)
                    {
                        candidate.set_shared(true);
                        let tile = Rc::clone(candidate);
                        self.tiles.insert((i, j), Rc::clone(&tile));
                        return Some(tile);
                    }
                }
            }
        }

        let opaque_rect = if self.layer_is_opaque {
            content_rect
        } else {
            Rect::default()
        };
        let tile = factory.create_tile(TileInfo {
            layer_id: self.layer_id,
            content_rect,
            opaque_rect,
            contents_scale: self.contents_scale,
            has_text_hint: self.has_text,
        })?;
        self.tiles.insert((i, j), Rc::clone(&tile));
        Some(tile)
    }

    /// Populate every unoccupied cell in the live-tiles rect.
    pub fn create_missing_tiles_in_live_rect(
        &mut self,
        factory: &dyn TileFactory,
        invalidation: &Region,
        twin: Option<&Tiling>,
    ) {
        let cells: Vec<CellKey> = self
            .grid
            .iter_rect(self.live_tiles_rect)
            .filter(|key| !self.tiles.contains_key(key))
            .collect();
        for (i, j) in cells {
            self.create_tile(i, j, factory, invalidation, twin);
        }
    }

    /// Replace the live-tiles rect: tiles falling outside are released,
    /// newly exposed cells are populated (sharing from the twin).
    pub fn set_live_tiles_rect(
        &mut self,
        new_live_rect: Rect,
        factory: &dyn TileFactory,
        invalidation: &Region,
        twin: Option<&Tiling>,
    ) {
        let new_live_rect = new_live_rect.intersect(&Rect::from_size(self.tiling_size()));
        if new_live_rect == self.live_tiles_rect {
            return;
        }

        let removed: Vec<CellKey> = self
            .grid
            .iter_difference(self.live_tiles_rect, new_live_rect)
            .collect();
        for key in removed {
            if let Some(tile) = self.tiles.remove(&key) {
                release_tile(&tile, self.tree);
            }
        }

        let old_live_rect = self.live_tiles_rect;
        self.live_tiles_rect = new_live_rect;

        let added: Vec<CellKey> = self
            .grid
            .iter_difference(new_live_rect, old_live_rect)
            .filter(|key| !self.tiles.contains_key(key))
            .collect();
        for (i, j) in added {
            self.create_tile(i, j, factory, invalidation, twin);
        }
    }

    /// Drop tiles intersecting `layer_region`, optionally recreating them as
    /// fresh unshared tiles (never shared — the content changed).
    pub fn invalidate(
        &mut self,
        layer_region: &Region,
        factory: &dyn TileFactory,
        recreate_tiles: bool,
    ) {
        let mut removed_cells: Vec<CellKey> = Vec::new();
        for layer_rect in layer_region.iter() {
            let content_rect = layer_rect
                .scale_to_enclosing(self.contents_scale)
                .intersect(&self.live_tiles_rect);
            if content_rect.is_empty() {
                continue;
            }
            for key in self.grid.iter_rect(content_rect) {
                if let Some(tile) = self.tiles.remove(&key) {
                    release_tile(&tile, self.tree);
                    removed_cells.push(key);
                }
            }
        }

        if recreate_tiles {
            let empty = Region::new();
            for (i, j) in removed_cells {
                self.create_tile(i, j, factory, &empty, None);
            }
        }
    }

    /// Resize to new layer bounds. Tiles whose cells no longer exist are
    /// released; content is assumed invalidated by the caller where needed.
    pub fn set_layer_bounds(&mut self, layer_bounds: Size) {
        if layer_bounds == self.layer_bounds {
            return;
        }
        self.layer_bounds = layer_bounds;
        let tiling_size = layer_bounds.scale_ceil(self.contents_scale);
        self.grid.set_tiling_size(tiling_size);
        self.live_tiles_rect = self
            .live_tiles_rect
            .intersect(&Rect::from_size(tiling_size));

        let grid = self.grid;
        let tree = self.tree;
        self.tiles.retain(|&(i, j), tile| {
            let keep = !grid.tile_bounds(i, j).is_empty()
                && tile.content_rect() == grid.tile_bounds(i, j);
            if !keep {
                release_tile(tile, tree);
            }
            keep
        });
    }

    /// Release every tile and clear the live rect.
    pub fn reset(&mut self) {
        for tile in self.tiles.values() {
            release_tile(tile, self.tree);
        }
        self.tiles.clear();
        self.live_tiles_rect = Rect::default();
    }

    /// Recompute per-tile priorities for this tiling's tree.
    ///
    /// Tiles intersecting the priority rect become NOW (and get their
    /// occlusion bit refreshed); tiles within the soon border become SOON;
    /// remaining live tiles become EVENTUALLY. Distances are screen-space
    /// Manhattan distances to the priority rect.
    pub fn update_priorities(
        &mut self,
        ctx: &PriorityContext<'_>,
        factory: &dyn TileFactory,
        invalidation: &Region,
        twin: Option<&Tiling>,
    ) {
        let tiling_rect = Rect::from_size(self.tiling_size());
        if tiling_rect.is_empty() {
            return;
        }

        self.current_visible_rect = ctx
            .visible_rect_in_layer
            .scale_to_enclosing(self.contents_scale);

        if !ctx.skip_priority_rect_update {
            self.current_priority_rect = ctx
                .priority_rect_in_layer
                .scale_to_enclosing(self.contents_scale);
        }

        let content_to_screen = {
            let ratio = ctx.ideal_contents_scale / self.contents_scale;
            if ratio.is_finite() && ratio > 0.0 {
                ratio
            } else {
                1.0
            }
        };

        let soon_border = (ctx.soon_border_px / content_to_screen).max(0.0) as i32;
        let interest_border = (ctx.interest_border_px / content_to_screen).max(0.0) as i32;

        let priority_rect = self.current_priority_rect;
        self.current_soon_rect = priority_rect.expand(soon_border);
        self.current_eventually_rect = priority_rect
            .expand(interest_border)
            .intersect(&tiling_rect);

        self.set_live_tiles_rect(self.current_eventually_rect, factory, invalidation, twin);

        let tree = self.tree;
        let resolution = self.resolution;
        let scale = self.contents_scale;

        for (&(i, j), tile) in &self.tiles {
            let bounds = self.grid.tile_bounds(i, j);
            if bounds.intersects(&priority_rect) {
                tile.set_priority(tree, TilePriority::new(resolution, PriorityBin::Now, 0.0));
                let occluded = match ctx.occlusion {
                    Some(occlusion) => {
                        let query = bounds
                            .intersect(&priority_rect)
                            .scale_to_enclosing(1.0 / scale);
                        occlusion.is_fully_occluded(&query)
                    }
                    None => false,
                };
                tile.set_occluded(tree, occluded);
                continue;
            }

            let distance = priority_rect.manhattan_internal_distance(&bounds) as f32
                * content_to_screen;
            let bin = if bounds.intersects(&self.current_soon_rect) {
                PriorityBin::Soon
            } else {
                PriorityBin::Eventually
            };
            tile.set_priority(tree, TilePriority::new(resolution, bin, distance));
            tile.set_occluded(tree, false);
        }
    }
}

/// Reset a tile's slot for the tree that stops referencing it. The tile is
/// refcounted and may outlive this tiling via the twin.
fn release_tile(tile: &Rc<Tile>, tree: WhichTree) {
    tile.reset_priority(tree);
    tile.set_shared(false);
}

impl Drop for Tiling {
    fn drop(&mut self) {
        for tile in self.tiles.values() {
            release_tile(tile, self.tree);
        }
    }
}

impl std::fmt::Debug for Tiling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tiling")
            .field("layer_id", &self.layer_id)
            .field("tree", &self.tree)
            .field("contents_scale", &self.contents_scale)
            .field("resolution", &self.resolution)
            .field("tile_count", &self.tiles.len())
            .field("live_tiles_rect", &self.live_tiles_rect)
            .finish()
    }
}
