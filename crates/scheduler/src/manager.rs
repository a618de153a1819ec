//! The tile manager: budget enforcement and raster task dispatch.
//!
//! The manager is the single owner of the raster boundary. Each pass it
//! applies completed raster work, evicts down to the soft memory limit in
//! reverse priority order, then schedules raster tasks in priority order
//! until the budget or the task cap is hit. Exceeding the hard limit never
//! blocks drawing: a tile whose resource cannot be acquired stays
//! unrasterized and is drawn as a placeholder quad.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use serde::Serialize;

use terrazzo_cache::{ResourcePool, BYTES_PER_PIXEL};
use terrazzo_tiles::{
    PaintSource, RasterTaskId, ResourceHandle, ResourceReleaser, Tile, TileFactory, TileId,
    TileInfo, TileVersion,
};

use crate::cancel::CancellationRegistry;
use crate::queues::{EvictionQueue, RasterQueue};
use crate::state::GlobalPriorityState;
use crate::tasks::{
    ImmediateRasterWorker, RasterCompletion, RasterOutcome, RasterTask, RasterWorker,
    ThreadedRasterWorker, WorkerPoolConfig,
};

/// Counters describing manager activity. Resource exhaustion surfaces here,
/// never as errors.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TileManagerStats {
    pub tiles_created: u64,
    pub tasks_scheduled: u64,
    pub tasks_completed: u64,
    /// Completions for tasks or tiles that no longer exist; silently dropped.
    pub stale_completions: u64,
    pub tiles_evicted: u64,
    pub bytes_evicted: u64,
    /// Tiles resolved to a solid color without a resource.
    pub solid_color_tiles: u64,
    /// Raster work denied (at schedule time) or degraded (at completion
    /// time) by the memory budget.
    pub raster_denied_memory: u64,
}

/// Returns evicted and replaced tile resources to the pool.
struct PoolReleaser {
    pool: Rc<RefCell<ResourcePool>>,
}

impl ResourceReleaser for PoolReleaser {
    fn release(&self, handle: ResourceHandle) {
        self.pool.borrow_mut().release(handle.id);
    }
}

/// Owns tile creation, the resource budget, and the raster worker seam.
pub struct TileManager {
    paint: Arc<dyn PaintSource>,
    pool: Rc<RefCell<ResourcePool>>,
    releaser: Rc<PoolReleaser>,
    worker: Box<dyn RasterWorker>,
    completions: Receiver<RasterCompletion>,
    cancellations: CancellationRegistry,

    next_tile_id: Cell<u64>,
    next_task_id: Cell<u64>,
    live_tiles: RefCell<HashMap<TileId, Weak<Tile>>>,
    pending_tasks: RefCell<HashMap<RasterTaskId, TileId>>,
    stats: RefCell<TileManagerStats>,
}

impl TileManager {
    /// Create a manager over an explicit worker and completion channel.
    pub fn new(
        paint: Arc<dyn PaintSource>,
        pool: Rc<RefCell<ResourcePool>>,
        worker: Box<dyn RasterWorker>,
        completions: Receiver<RasterCompletion>,
    ) -> Self {
        Self {
            paint,
            releaser: Rc::new(PoolReleaser {
                pool: Rc::clone(&pool),
            }),
            pool,
            worker,
            completions,
            cancellations: CancellationRegistry::new(),
            next_tile_id: Cell::new(1),
            next_task_id: Cell::new(1),
            live_tiles: RefCell::new(HashMap::new()),
            pending_tasks: RefCell::new(HashMap::new()),
            stats: RefCell::new(TileManagerStats::default()),
        }
    }

    /// Create a manager that rasterizes synchronously on the scheduling
    /// thread.
    pub fn with_immediate_worker(
        paint: Arc<dyn PaintSource>,
        pool: Rc<RefCell<ResourcePool>>,
    ) -> Self {
        let (sender, receiver) = channel();
        let worker = ImmediateRasterWorker::new(Arc::clone(&paint), sender);
        Self::new(paint, pool, Box::new(worker), receiver)
    }

    /// Create a manager backed by a worker thread pool.
    pub fn with_threaded_worker(
        paint: Arc<dyn PaintSource>,
        pool: Rc<RefCell<ResourcePool>>,
        config: WorkerPoolConfig,
    ) -> Self {
        let (sender, receiver) = channel();
        let worker = ThreadedRasterWorker::new(Arc::clone(&paint), sender, config);
        Self::new(paint, pool, Box::new(worker), receiver)
    }

    pub fn pool(&self) -> &Rc<RefCell<ResourcePool>> {
        &self.pool
    }

    pub fn stats(&self) -> TileManagerStats {
        *self.stats.borrow()
    }

    /// Number of raster tasks currently in flight.
    pub fn pending_task_count(&self) -> usize {
        self.pending_tasks.borrow().len()
    }

    /// Run one scheduling pass over the gathered live tiles.
    ///
    /// `state` is an immutable snapshot; `tiles` is the union of both trees'
    /// live tiles (duplicates from shared tiles are tolerated).
    pub fn prepare_tiles(&self, state: &GlobalPriorityState, tiles: &[Rc<Tile>]) {
        self.check_for_completed_tasks();
        self.sweep_dead_tiles();

        self.pool
            .borrow_mut()
            .set_limits(terrazzo_cache::ResourceLimits {
                max_bytes: state.hard_memory_limit_bytes,
                max_resources: state.max_resource_count,
            });

        let unique = dedup_tiles(tiles);

        // Evict in reverse priority order while over the soft budget.
        let mut eviction = EvictionQueue::new(&unique, state.tree_priority);
        while self.over_soft_budget(state) {
            let Some(tile) = eviction.pop() else {
                break;
            };
            let freed = tile.release_resources();
            if freed > 0 {
                let mut stats = self.stats.borrow_mut();
                stats.tiles_evicted += 1;
                stats.bytes_evicted += freed as u64;
            }
        }

        // Schedule raster work in priority order against the same budget.
        let mut raster = RasterQueue::new(&unique, state.tree_priority);
        let mut scheduled = 0usize;
        let mut planned_bytes = 0usize;
        while scheduled < state.max_raster_tasks {
            let Some(tile) = raster.pop() else {
                break;
            };
            if tile.raster_task().is_some() {
                continue;
            }
            let mode = tile.raster_mode_for_tree_priority(state.tree_priority);
            if !tile.needs_raster_for_mode(mode) {
                continue;
            }

            let estimate = tile.content_rect().area().max(0) as usize * BYTES_PER_PIXEL;
            let allocated = self.pool.borrow().bytes_allocated();
            if allocated + planned_bytes + estimate > state.soft_memory_limit_bytes {
                self.stats.borrow_mut().raster_denied_memory += 1;
                log::debug!(
                    "raster scheduling stopped at soft limit ({} allocated, {} planned)",
                    allocated,
                    planned_bytes
                );
                break;
            }

            let task_id = RasterTaskId(self.next_task_id.get());
            self.next_task_id.set(task_id.0 + 1);

            tile.set_raster_task(Some(task_id));
            self.pending_tasks.borrow_mut().insert(task_id, tile.id());
            let token = self.cancellations.register(task_id);
            self.worker.schedule(
                RasterTask {
                    task_id,
                    tile_id: tile.id(),
                    layer_id: tile.layer_id(),
                    content_rect: tile.content_rect(),
                    contents_scale: tile.contents_scale(),
                    mode,
                },
                token,
            );

            planned_bytes += estimate;
            scheduled += 1;
            self.stats.borrow_mut().tasks_scheduled += 1;
        }
    }

    /// Apply raster completions delivered since the last call.
    ///
    /// Idempotent and safe against stale reports: completions for unknown
    /// tasks, destroyed tiles, or superseded tasks are counted and dropped.
    /// Returns the number of completions applied.
    pub fn check_for_completed_tasks(&self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions.try_recv() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_completion(&self, completion: RasterCompletion) -> bool {
        let known = self
            .pending_tasks
            .borrow_mut()
            .remove(&completion.task_id)
            .is_some();
        self.cancellations.unregister(completion.task_id);
        if !known {
            self.stats.borrow_mut().stale_completions += 1;
            return false;
        }

        let tile = self
            .live_tiles
            .borrow()
            .get(&completion.tile_id)
            .and_then(Weak::upgrade);
        let Some(tile) = tile else {
            self.stats.borrow_mut().stale_completions += 1;
            return false;
        };

        // The tile may have been re-scheduled since; only the task it is
        // currently waiting on may deliver a result.
        if tile.raster_task() != Some(completion.task_id) {
            self.stats.borrow_mut().stale_completions += 1;
            return false;
        }
        tile.set_raster_task(None);

        match completion.outcome {
            RasterOutcome::SolidColor(color) => {
                tile.set_version(completion.mode, TileVersion::SolidColor(color));
                self.stats.borrow_mut().solid_color_tiles += 1;
            }
            RasterOutcome::Pixels { bytes, has_text } => {
                tile.set_has_text(has_text);
                let acquired = self.pool.borrow_mut().acquire(bytes);
                match acquired {
                    Some(id) => {
                        tile.set_version(
                            completion.mode,
                            TileVersion::Resource(ResourceHandle { id, bytes }),
                        );
                    }
                    None => {
                        // Hard limit: the tile stays unrasterized and will
                        // draw as a placeholder.
                        self.stats.borrow_mut().raster_denied_memory += 1;
                        log::warn!(
                            "resource pool at hard limit; tile {:?} degrades to placeholder",
                            tile.id()
                        );
                    }
                }
            }
        }

        self.stats.borrow_mut().tasks_completed += 1;
        true
    }

    /// Cancel a tile's in-flight raster task, if any. A task that has not
    /// started becomes a no-op; a started task's late result is dropped as
    /// stale.
    pub fn cancel_raster_task(&self, tile: &Tile) {
        if let Some(task_id) = tile.raster_task() {
            self.cancellations.cancel(task_id);
            self.cancellations.unregister(task_id);
            self.pending_tasks.borrow_mut().remove(&task_id);
            tile.set_raster_task(None);
        }
    }

    fn over_soft_budget(&self, state: &GlobalPriorityState) -> bool {
        let pool = self.pool.borrow();
        pool.bytes_allocated() > state.soft_memory_limit_bytes
            || pool.resource_count() > state.max_resource_count
    }

    fn sweep_dead_tiles(&self) {
        self.live_tiles
            .borrow_mut()
            .retain(|_, weak| weak.strong_count() > 0);
    }

    /// Serializable snapshot of manager and pool state for debugging.
    pub fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "stats": *self.stats.borrow(),
            "pool": self.pool.borrow().stats(),
            "pending_tasks": self.pending_tasks.borrow().len(),
            "live_tiles": self.live_tiles.borrow().len(),
        })
    }
}

impl TileFactory for TileManager {
    /// Create a tile for a tiling's grid cell. Refused (returns `None`) when
    /// the paint source has no rasterable content there; the cell stays
    /// unpopulated and draws as a placeholder.
    fn create_tile(&self, info: TileInfo) -> Option<Rc<Tile>> {
        if !self.paint.can_raster(info.contents_scale, info.content_rect) {
            return None;
        }

        let id = TileId(self.next_tile_id.get());
        self.next_tile_id.set(id.0 + 1);

        let tile = Rc::new(Tile::new(
            id,
            info,
            Some(Rc::clone(&self.releaser) as Rc<dyn ResourceReleaser>),
        ));
        self.live_tiles
            .borrow_mut()
            .insert(id, Rc::downgrade(&tile));
        self.stats.borrow_mut().tiles_created += 1;
        Some(tile)
    }
}

fn dedup_tiles(tiles: &[Rc<Tile>]) -> Vec<Rc<Tile>> {
    let mut seen = std::collections::HashSet::new();
    tiles
        .iter()
        .filter(|tile| seen.insert(tile.id()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrazzo_cache::ResourceLimits;
    use terrazzo_geometry::Rect;
    use terrazzo_tiles::{
        PriorityBin, RasterCanvas, RasterMode, RegionAnalysis, TilePriority, TileResolution,
        TreePriority, WhichTree,
    };

    struct TestPaint {
        solid: bool,
        rasterable: bool,
    }

    impl PaintSource for TestPaint {
        fn can_raster(&self, _scale: f32, _rect: Rect) -> bool {
            self.rasterable
        }

        fn analyze(&self, _rect: Rect, _scale: f32) -> RegionAnalysis {
            RegionAnalysis {
                solid_color: if self.solid { Some([9, 9, 9, 255]) } else { None },
                has_text: false,
            }
        }

        fn raster(&self, canvas: &mut RasterCanvas, _rect: Rect, _scale: f32) {
            canvas.pixels_mut().fill(1);
        }
    }

    fn manager(solid: bool, limits: ResourceLimits) -> TileManager {
        let pool = Rc::new(RefCell::new(ResourcePool::new(limits)));
        TileManager::with_immediate_worker(
            Arc::new(TestPaint {
                solid,
                rasterable: true,
            }),
            pool,
        )
    }

    fn default_state() -> GlobalPriorityState {
        GlobalPriorityState {
            tree_priority: TreePriority::SamePriorityForBothTrees,
            soft_memory_limit_bytes: 64 * 1024 * 1024,
            hard_memory_limit_bytes: 96 * 1024 * 1024,
            max_resource_count: 1024,
            max_raster_tasks: 32,
        }
    }

    fn visible_tile(manager: &TileManager) -> Rc<Tile> {
        let tile = manager
            .create_tile(TileInfo {
                layer_id: 1,
                content_rect: Rect::new(0, 0, 100, 100),
                opaque_rect: Rect::default(),
                contents_scale: 1.0,
                has_text_hint: false,
            })
            .unwrap();
        tile.set_priority(
            WhichTree::Active,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Now, 0.0),
        );
        tile
    }

    #[test]
    fn test_create_tile_refused_without_content() {
        let pool = Rc::new(RefCell::new(ResourcePool::default()));
        let manager = TileManager::with_immediate_worker(
            Arc::new(TestPaint {
                solid: false,
                rasterable: false,
            }),
            pool,
        );

        let tile = manager.create_tile(TileInfo {
            layer_id: 1,
            content_rect: Rect::new(0, 0, 100, 100),
            opaque_rect: Rect::default(),
            contents_scale: 1.0,
            has_text_hint: false,
        });
        assert!(tile.is_none());
        assert_eq!(manager.stats().tiles_created, 0);
    }

    #[test]
    fn test_prepare_tiles_rasterizes_visible_tile() {
        let manager = manager(false, ResourceLimits::default());
        let tile = visible_tile(&manager);

        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile)]);
        assert_eq!(manager.stats().tasks_scheduled, 1);

        // The immediate worker has already delivered the completion.
        manager.check_for_completed_tasks();
        assert!(tile.is_ready_to_draw());
        assert!(tile.has_resource());
        assert_eq!(manager.pool().borrow().bytes_allocated(), 100 * 100 * 4);
        assert_eq!(manager.stats().tasks_completed, 1);
    }

    #[test]
    fn test_solid_color_needs_no_resource() {
        let manager = manager(true, ResourceLimits::default());
        let tile = visible_tile(&manager);

        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile)]);
        manager.check_for_completed_tasks();

        assert!(tile.is_ready_to_draw());
        assert!(!tile.has_resource());
        assert_eq!(manager.pool().borrow().bytes_allocated(), 0);
        assert_eq!(manager.stats().solid_color_tiles, 1);
    }

    #[test]
    fn test_ready_tile_is_not_rescheduled() {
        let manager = manager(false, ResourceLimits::default());
        let tile = visible_tile(&manager);

        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile)]);
        manager.check_for_completed_tasks();
        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile)]);
        assert_eq!(manager.stats().tasks_scheduled, 1);
    }

    #[test]
    fn test_stale_completion_for_dropped_tile_is_ignored() {
        // A worker that never runs, so completions can be forged manually.
        struct NullWorker;
        impl RasterWorker for NullWorker {
            fn schedule(&self, _task: RasterTask, _token: crate::cancel::CancellationToken) {}
        }

        let pool = Rc::new(RefCell::new(ResourcePool::default()));
        let (sender, receiver) = channel();
        let manager = TileManager::new(
            Arc::new(TestPaint {
                solid: false,
                rasterable: true,
            }),
            pool,
            Box::new(NullWorker),
            receiver,
        );

        let tile = visible_tile(&manager);
        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile)]);
        assert_eq!(manager.pending_task_count(), 1);
        let task_id = tile.raster_task().unwrap();

        // The tile is destroyed before its task completes.
        drop(tile);
        sender
            .send(RasterCompletion {
                task_id,
                tile_id: TileId(1),
                mode: RasterMode::HighQuality,
                outcome: RasterOutcome::Pixels {
                    bytes: 100,
                    has_text: false,
                },
            })
            .unwrap();

        assert_eq!(manager.check_for_completed_tasks(), 0);
        assert_eq!(manager.stats().stale_completions, 1);
        // No resource was leaked for the dead tile.
        assert_eq!(manager.pool().borrow().bytes_allocated(), 0);

        // Replaying the same completion is harmless.
        assert_eq!(manager.check_for_completed_tasks(), 0);
    }

    #[test]
    fn test_cancel_raster_task() {
        struct NullWorker;
        impl RasterWorker for NullWorker {
            fn schedule(&self, _task: RasterTask, _token: crate::cancel::CancellationToken) {}
        }

        let pool = Rc::new(RefCell::new(ResourcePool::default()));
        let (_sender, receiver) = channel();
        let manager = TileManager::new(
            Arc::new(TestPaint {
                solid: false,
                rasterable: true,
            }),
            pool,
            Box::new(NullWorker),
            receiver,
        );

        let tile = visible_tile(&manager);
        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile)]);
        assert!(tile.raster_task().is_some());

        manager.cancel_raster_task(&tile);
        assert!(tile.raster_task().is_none());
        assert_eq!(manager.pending_task_count(), 0);
    }

    #[test]
    fn test_eviction_runs_while_over_soft_budget() {
        let manager = manager(false, ResourceLimits::default());
        let near = visible_tile(&manager);
        let far = visible_tile(&manager);
        far.set_priority(
            WhichTree::Active,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Eventually, 500.0),
        );

        let tiles = vec![Rc::clone(&near), Rc::clone(&far)];
        manager.prepare_tiles(&default_state(), &tiles);
        manager.check_for_completed_tasks();
        assert!(near.has_resource() && far.has_resource());

        // Shrink the soft budget so only one tile fits; the far tile is the
        // eviction victim.
        let mut tight = default_state();
        tight.soft_memory_limit_bytes = 100 * 100 * 4 + 1;
        manager.prepare_tiles(&tight, &tiles);

        assert!(near.has_resource());
        assert!(!far.has_resource());
        assert_eq!(manager.stats().tiles_evicted, 1);
    }

    #[test]
    fn test_required_tiles_survive_eviction() {
        let manager = manager(false, ResourceLimits::default());
        let required = visible_tile(&manager);
        required.set_priority(
            WhichTree::Pending,
            TilePriority::new(TileResolution::HighResolution, PriorityBin::Eventually, 500.0),
        );
        required.mark_required_for_activation();

        manager.prepare_tiles(&default_state(), &[Rc::clone(&required)]);
        manager.check_for_completed_tasks();
        assert!(required.has_resource());

        let mut tight = default_state();
        tight.soft_memory_limit_bytes = 0;
        // Re-mark: priorities were not rewritten, flag is still set.
        manager.prepare_tiles(&tight, &[Rc::clone(&required)]);
        assert!(required.has_resource());
    }

    #[test]
    fn test_task_cap_limits_scheduling() {
        let manager = manager(false, ResourceLimits::default());
        let tiles: Vec<Rc<Tile>> = (0..10).map(|_| visible_tile(&manager)).collect();

        let mut state = default_state();
        state.max_raster_tasks = 3;
        manager.prepare_tiles(&state, &tiles);
        assert_eq!(manager.stats().tasks_scheduled, 3);
    }

    #[test]
    fn test_soft_budget_stops_scheduling() {
        let manager = manager(false, ResourceLimits::default());
        let tiles: Vec<Rc<Tile>> = (0..4).map(|_| visible_tile(&manager)).collect();

        let mut state = default_state();
        // Room for exactly two 100x100 tiles.
        state.soft_memory_limit_bytes = 2 * 100 * 100 * 4;
        manager.prepare_tiles(&state, &tiles);

        assert_eq!(manager.stats().tasks_scheduled, 2);
        assert_eq!(manager.stats().raster_denied_memory, 1);
    }

    #[test]
    fn test_hard_limit_degrades_to_placeholder() {
        // Pool that can hold a single tile.
        let limits = ResourceLimits {
            max_bytes: 100 * 100 * 4,
            max_resources: 16,
        };
        let manager = manager(false, limits);
        let first = visible_tile(&manager);
        let second = visible_tile(&manager);

        let mut state = default_state();
        state.hard_memory_limit_bytes = limits.max_bytes;

        manager.prepare_tiles(&state, &[Rc::clone(&first), Rc::clone(&second)]);
        manager.check_for_completed_tasks();

        // One tile got the resource, the other degraded without failing.
        let ready = [&first, &second]
            .iter()
            .filter(|tile| tile.has_resource())
            .count();
        assert_eq!(ready, 1);
        assert!(manager.stats().raster_denied_memory >= 1);
    }

    #[test]
    fn test_shared_tiles_deduplicated() {
        let manager = manager(false, ResourceLimits::default());
        let tile = visible_tile(&manager);
        // The same tile gathered from both trees.
        manager.prepare_tiles(&default_state(), &[Rc::clone(&tile), Rc::clone(&tile)]);
        assert_eq!(manager.stats().tasks_scheduled, 1);
    }

    #[test]
    fn test_debug_state_shape() {
        let manager = manager(false, ResourceLimits::default());
        let state = manager.debug_state();
        assert!(state.get("stats").is_some());
        assert!(state.get("pool").is_some());
    }
}
