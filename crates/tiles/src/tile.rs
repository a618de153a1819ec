//! The tile entity: one grid cell at one resolution.
//!
//! Tiles are shared between the two trees' tilings via `Rc`; the tile's
//! lifetime is that of its longest holder and it never references an owning
//! tiling. All mutable state lives in `Cell`s — the engine layer is
//! single-threaded, and each tree only ever writes its own priority slot on
//! a shared tile, so there are no cross-tree write races to guard against.

use std::cell::Cell;
use std::rc::Rc;

use terrazzo_geometry::Rect;

use crate::paint::Color;
use crate::priority::{TilePriority, TreePriority, WhichTree};

/// Identifier of the layer a tile belongs to.
pub type LayerId = u32;

/// Process-unique tile identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

/// Identifier of an in-flight raster task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterTaskId(pub u64);

/// Quality tier a tile version was (or will be) rasterized at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterMode {
    HighQuality = 0,
    LowQuality = 1,
}

/// Number of raster modes; sizes the per-tile version array.
pub const NUM_RASTER_MODES: usize = 2;

/// All raster modes, in version-preference order.
pub const RASTER_MODES: [RasterMode; NUM_RASTER_MODES] =
    [RasterMode::HighQuality, RasterMode::LowQuality];

/// A backing resource acquired from the resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub id: u64,
    pub bytes: usize,
}

/// The state of one raster-mode version of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileVersion {
    /// No usable result yet.
    #[default]
    Unrasterized,
    /// The content was a single solid color; no resource is needed.
    SolidColor(Color),
    /// Rasterized pixels backed by a pool resource.
    Resource(ResourceHandle),
}

impl TileVersion {
    /// True if this version holds a usable result.
    pub fn is_ready_to_draw(&self) -> bool {
        !matches!(self, TileVersion::Unrasterized)
    }

    /// True if this version holds a pool resource.
    pub fn has_resource(&self) -> bool {
        matches!(self, TileVersion::Resource(_))
    }

    /// The backing resource, if any.
    pub fn resource(&self) -> Option<ResourceHandle> {
        match self {
            TileVersion::Resource(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Returns resources to the pool when a tile drops or is evicted.
///
/// Implemented by the tile manager; only ever invoked on the scheduling
/// thread.
pub trait ResourceReleaser {
    fn release(&self, handle: ResourceHandle);
}

/// Immutable creation parameters for a tile.
#[derive(Debug, Clone, Copy)]
pub struct TileInfo {
    pub layer_id: LayerId,
    pub content_rect: Rect,
    pub opaque_rect: Rect,
    pub contents_scale: f32,
    /// Layer-level hint that the content contains text; refined by analysis
    /// when the tile is rasterized.
    pub has_text_hint: bool,
}

/// The smallest cacheable unit: one grid cell at one resolution.
pub struct Tile {
    id: TileId,
    layer_id: LayerId,
    content_rect: Rect,
    opaque_rect: Rect,
    contents_scale: f32,

    priorities: [Cell<TilePriority>; 2],
    occluded: [Cell<bool>; 2],
    shared: Cell<bool>,
    versions: [Cell<TileVersion>; NUM_RASTER_MODES],
    raster_task: Cell<Option<RasterTaskId>>,
    has_text: Cell<bool>,

    releaser: Option<Rc<dyn ResourceReleaser>>,
}

impl Tile {
    /// Create a tile. Geometry is fixed for the tile's lifetime.
    pub fn new(id: TileId, info: TileInfo, releaser: Option<Rc<dyn ResourceReleaser>>) -> Self {
        Self {
            id,
            layer_id: info.layer_id,
            content_rect: info.content_rect,
            opaque_rect: info.opaque_rect.intersect(&info.content_rect),
            contents_scale: info.contents_scale,
            priorities: [
                Cell::new(TilePriority::default()),
                Cell::new(TilePriority::default()),
            ],
            occluded: [Cell::new(false), Cell::new(false)],
            shared: Cell::new(false),
            versions: Default::default(),
            raster_task: Cell::new(None),
            has_text: Cell::new(info.has_text_hint),
            releaser,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn content_rect(&self) -> Rect {
        self.content_rect
    }

    pub fn opaque_rect(&self) -> Rect {
        self.opaque_rect
    }

    pub fn contents_scale(&self) -> f32 {
        self.contents_scale
    }

    /// The priority for one tree. A pure state read.
    pub fn priority(&self, tree: WhichTree) -> TilePriority {
        self.priorities[tree.index()].get()
    }

    /// Set the priority for one tree. A pure state update with no side
    /// effects; note that this overwrites the required-for-activation flag,
    /// which callers must re-mark every readiness pass.
    pub fn set_priority(&self, tree: WhichTree, priority: TilePriority) {
        self.priorities[tree.index()].set(priority);
    }

    /// Reset one tree's priority to the default. Called when a tiling stops
    /// referencing a shared tile that may outlive it.
    pub fn reset_priority(&self, tree: WhichTree) {
        self.priorities[tree.index()].set(TilePriority::default());
    }

    /// The priority the scheduler should act on under `mode`.
    pub fn priority_for_tree_priority(&self, mode: TreePriority) -> TilePriority {
        match mode {
            TreePriority::SmoothnessTakesPriority => self.priority(WhichTree::Active),
            TreePriority::NewContentTakesPriority => self.priority(WhichTree::Pending),
            TreePriority::SamePriorityForBothTrees => TilePriority::combined(
                &self.priority(WhichTree::Active),
                &self.priority(WhichTree::Pending),
            ),
        }
    }

    pub fn set_occluded(&self, tree: WhichTree, occluded: bool) {
        self.occluded[tree.index()].set(occluded);
    }

    pub fn is_occluded(&self, tree: WhichTree) -> bool {
        self.occluded[tree.index()].get()
    }

    /// Occlusion under a tree-priority mode. Balanced mode only treats a
    /// tile as occluded when it is occluded for both trees.
    pub fn is_occluded_for_tree_priority(&self, mode: TreePriority) -> bool {
        match mode {
            TreePriority::SmoothnessTakesPriority => self.is_occluded(WhichTree::Active),
            TreePriority::NewContentTakesPriority => self.is_occluded(WhichTree::Pending),
            TreePriority::SamePriorityForBothTrees => {
                self.is_occluded(WhichTree::Active) && self.is_occluded(WhichTree::Pending)
            }
        }
    }

    /// True once both trees' tilings reference this tile.
    pub fn is_shared(&self) -> bool {
        self.shared.get()
    }

    pub fn set_shared(&self, shared: bool) {
        self.shared.set(shared);
    }

    /// Flag this tile as required before the pending tree may activate.
    pub fn mark_required_for_activation(&self) {
        let mut priority = self.priority(WhichTree::Pending);
        priority.required_for_activation = true;
        self.set_priority(WhichTree::Pending, priority);
    }

    pub fn required_for_activation(&self) -> bool {
        self.priority(WhichTree::Pending).required_for_activation
    }

    pub fn version(&self, mode: RasterMode) -> TileVersion {
        self.versions[mode as usize].get()
    }

    /// Install a version result, releasing any resource it replaces.
    pub fn set_version(&self, mode: RasterMode, version: TileVersion) {
        let previous = self.versions[mode as usize].replace(version);
        if let Some(handle) = previous.resource() {
            if let Some(releaser) = &self.releaser {
                releaser.release(handle);
            }
        }
    }

    /// Drop all version results, returning their resources to the pool.
    /// Returns the number of bytes released.
    pub fn release_resources(&self) -> usize {
        let mut released = 0;
        for mode in RASTER_MODES {
            let previous = self.versions[mode as usize].replace(TileVersion::Unrasterized);
            if let Some(handle) = previous.resource() {
                released += handle.bytes;
                if let Some(releaser) = &self.releaser {
                    releaser.release(handle);
                }
            }
        }
        released
    }

    /// True iff at least one raster-mode version holds a usable result.
    pub fn is_ready_to_draw(&self) -> bool {
        RASTER_MODES
            .iter()
            .any(|&mode| self.version(mode).is_ready_to_draw())
    }

    /// True if any version holds a pool resource.
    pub fn has_resource(&self) -> bool {
        RASTER_MODES
            .iter()
            .any(|&mode| self.version(mode).has_resource())
    }

    /// True if `mode` still needs rasterization.
    pub fn needs_raster_for_mode(&self, mode: RasterMode) -> bool {
        !self.version(mode).is_ready_to_draw()
    }

    /// Bytes of pool memory backing this tile.
    pub fn memory_usage_bytes(&self) -> usize {
        RASTER_MODES
            .iter()
            .filter_map(|&mode| self.version(mode).resource())
            .map(|handle| handle.bytes)
            .sum()
    }

    /// The version to draw with: the first ready mode, or `Unrasterized`
    /// (caller emits a placeholder quad).
    pub fn draw_version(&self) -> TileVersion {
        RASTER_MODES
            .iter()
            .map(|&mode| self.version(mode))
            .find(TileVersion::is_ready_to_draw)
            .unwrap_or(TileVersion::Unrasterized)
    }

    pub fn raster_task(&self) -> Option<RasterTaskId> {
        self.raster_task.get()
    }

    pub fn set_raster_task(&self, task: Option<RasterTaskId>) {
        self.raster_task.set(task);
    }

    pub fn has_text(&self) -> bool {
        self.has_text.get()
    }

    pub fn set_has_text(&self, has_text: bool) {
        self.has_text.set(has_text);
    }

    /// Select the raster mode to produce for this tile under `mode`.
    ///
    /// Low-resolution tiles always rasterize at low quality. Otherwise low
    /// quality is only acceptable when smoothness dominates and the content
    /// has no text; text pins the tile to high quality for legibility.
    pub fn raster_mode_for_tree_priority(&self, mode: TreePriority) -> RasterMode {
        use crate::priority::TileResolution;

        let priority = self.priority_for_tree_priority(mode);
        if priority.resolution == TileResolution::LowResolution {
            return RasterMode::LowQuality;
        }
        if matches!(mode, TreePriority::SmoothnessTakesPriority) && !self.has_text() {
            return RasterMode::LowQuality;
        }
        RasterMode::HighQuality
    }
}

impl Drop for Tile {
    fn drop(&mut self) {
        self.release_resources();
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("layer_id", &self.layer_id)
            .field("content_rect", &self.content_rect)
            .field("contents_scale", &self.contents_scale)
            .field("shared", &self.shared.get())
            .field("ready", &self.is_ready_to_draw())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::{PriorityBin, TileResolution};
    use std::cell::RefCell;

    fn test_info() -> TileInfo {
        TileInfo {
            layer_id: 1,
            content_rect: Rect::new(0, 0, 256, 256),
            opaque_rect: Rect::default(),
            contents_scale: 1.0,
            has_text_hint: false,
        }
    }

    #[derive(Default)]
    struct RecordingReleaser {
        released: RefCell<Vec<ResourceHandle>>,
    }

    impl ResourceReleaser for RecordingReleaser {
        fn release(&self, handle: ResourceHandle) {
            self.released.borrow_mut().push(handle);
        }
    }

    #[test]
    fn test_new_tile_is_not_ready() {
        let tile = Tile::new(TileId(1), test_info(), None);
        assert!(!tile.is_ready_to_draw());
        assert!(!tile.has_resource());
        assert_eq!(tile.draw_version(), TileVersion::Unrasterized);
        assert!(tile.needs_raster_for_mode(RasterMode::HighQuality));
    }

    #[test]
    fn test_solid_color_version_is_ready_without_resource() {
        let tile = Tile::new(TileId(1), test_info(), None);
        tile.set_version(RasterMode::HighQuality, TileVersion::SolidColor([255, 0, 0, 255]));
        assert!(tile.is_ready_to_draw());
        assert!(!tile.has_resource());
        assert_eq!(tile.memory_usage_bytes(), 0);
    }

    #[test]
    fn test_resource_version() {
        let tile = Tile::new(TileId(1), test_info(), None);
        let handle = ResourceHandle { id: 7, bytes: 256 * 256 * 4 };
        tile.set_version(RasterMode::HighQuality, TileVersion::Resource(handle));
        assert!(tile.is_ready_to_draw());
        assert!(tile.has_resource());
        assert_eq!(tile.memory_usage_bytes(), 256 * 256 * 4);
        assert_eq!(tile.draw_version(), TileVersion::Resource(handle));
    }

    #[test]
    fn test_priority_slots_are_independent() {
        let tile = Tile::new(TileId(1), test_info(), None);
        let now = TilePriority::new(TileResolution::HighResolution, PriorityBin::Now, 0.0);
        tile.set_priority(WhichTree::Pending, now);

        assert_eq!(tile.priority(WhichTree::Pending).bin, PriorityBin::Now);
        assert_eq!(tile.priority(WhichTree::Active).bin, PriorityBin::Eventually);

        tile.reset_priority(WhichTree::Pending);
        assert_eq!(tile.priority(WhichTree::Pending), TilePriority::default());
    }

    #[test]
    fn test_priority_for_tree_priority_modes() {
        let tile = Tile::new(TileId(1), test_info(), None);
        tile.set_priority(
            WhichTree::Active,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Soon, 40.0),
        );
        tile.set_priority(
            WhichTree::Pending,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Now, 0.0),
        );

        let smoothness = tile.priority_for_tree_priority(TreePriority::SmoothnessTakesPriority);
        assert_eq!(smoothness.bin, PriorityBin::Soon);

        let new_content = tile.priority_for_tree_priority(TreePriority::NewContentTakesPriority);
        assert_eq!(new_content.bin, PriorityBin::Now);

        let balanced = tile.priority_for_tree_priority(TreePriority::SamePriorityForBothTrees);
        assert_eq!(balanced.bin, PriorityBin::Now);
        assert_eq!(balanced.distance_to_visible, 0.0);
    }

    #[test]
    fn test_required_for_activation_flag() {
        let tile = Tile::new(TileId(1), test_info(), None);
        assert!(!tile.required_for_activation());
        tile.mark_required_for_activation();
        assert!(tile.required_for_activation());

        // A later priority write clears the flag: callers re-mark per pass.
        tile.set_priority(
            WhichTree::Pending,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Now, 0.0),
        );
        assert!(!tile.required_for_activation());
    }

    #[test]
    fn test_occlusion_per_tree_and_mode() {
        let tile = Tile::new(TileId(1), test_info(), None);
        tile.set_occluded(WhichTree::Active, true);

        assert!(tile.is_occluded(WhichTree::Active));
        assert!(!tile.is_occluded(WhichTree::Pending));
        assert!(tile.is_occluded_for_tree_priority(TreePriority::SmoothnessTakesPriority));
        assert!(!tile.is_occluded_for_tree_priority(TreePriority::NewContentTakesPriority));
        // Balanced needs both trees occluded.
        assert!(!tile.is_occluded_for_tree_priority(TreePriority::SamePriorityForBothTrees));

        tile.set_occluded(WhichTree::Pending, true);
        assert!(tile.is_occluded_for_tree_priority(TreePriority::SamePriorityForBothTrees));
    }

    #[test]
    fn test_replacing_resource_releases_old_handle() {
        let releaser = Rc::new(RecordingReleaser::default());
        let tile = Tile::new(TileId(1), test_info(), Some(releaser.clone()));

        let first = ResourceHandle { id: 1, bytes: 100 };
        let second = ResourceHandle { id: 2, bytes: 200 };
        tile.set_version(RasterMode::HighQuality, TileVersion::Resource(first));
        tile.set_version(RasterMode::HighQuality, TileVersion::Resource(second));

        assert_eq!(releaser.released.borrow().as_slice(), &[first]);
    }

    #[test]
    fn test_drop_releases_resources() {
        let releaser = Rc::new(RecordingReleaser::default());
        {
            let tile = Tile::new(TileId(1), test_info(), Some(releaser.clone()));
            tile.set_version(
                RasterMode::LowQuality,
                TileVersion::Resource(ResourceHandle { id: 9, bytes: 64 }),
            );
        }
        assert_eq!(releaser.released.borrow().len(), 1);
        assert_eq!(releaser.released.borrow()[0].id, 9);
    }

    #[test]
    fn test_release_resources_reports_bytes() {
        let tile = Tile::new(TileId(1), test_info(), None);
        tile.set_version(
            RasterMode::HighQuality,
            TileVersion::Resource(ResourceHandle { id: 1, bytes: 300 }),
        );
        tile.set_version(RasterMode::LowQuality, TileVersion::SolidColor([0; 4]));

        assert_eq!(tile.release_resources(), 300);
        assert!(!tile.is_ready_to_draw());
    }

    #[test]
    fn test_raster_mode_selection() {
        let tile = Tile::new(TileId(1), test_info(), None);
        tile.set_priority(
            WhichTree::Active,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Now, 0.0),
        );

        // Smoothness without text allows low quality.
        assert_eq!(
            tile.raster_mode_for_tree_priority(TreePriority::SmoothnessTakesPriority),
            RasterMode::LowQuality
        );

        // Text pins to high quality.
        tile.set_has_text(true);
        assert_eq!(
            tile.raster_mode_for_tree_priority(TreePriority::SmoothnessTakesPriority),
            RasterMode::HighQuality
        );

        // Low-resolution tiles always rasterize at low quality.
        tile.set_priority(
            WhichTree::Active,
            TilePriority::new(TileResolution::LowResolution, PriorityBin::Now, 0.0),
        );
        assert_eq!(
            tile.raster_mode_for_tree_priority(TreePriority::SmoothnessTakesPriority),
            RasterMode::LowQuality
        );
    }

    #[test]
    fn test_opaque_rect_clipped_to_content() {
        let info = TileInfo {
            opaque_rect: Rect::new(-10, -10, 600, 600),
            ..test_info()
        };
        let tile = Tile::new(TileId(1), info, None);
        assert_eq!(tile.opaque_rect(), Rect::new(0, 0, 256, 256));
    }
}
