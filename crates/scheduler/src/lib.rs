//! Priority queues and the resource-budget scheduler.
//!
//! This crate turns per-tile priorities into work: the raster queue orders
//! tiles by how urgently they need pixels, the eviction queue is its exact
//! reverse, and the tile manager enforces the memory budget — evicting
//! over-budget tiles, dispatching raster tasks to the worker seam, and
//! applying (or discarding stale) completions on the scheduling thread.
//!
//! # Example
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use terrazzo_cache::{MemoryPolicy, ResourcePool};
//! use terrazzo_scheduler::{GlobalPriorityState, TileManager};
//! use terrazzo_tiles::TreePriority;
//!
//! # fn paint() -> Arc<dyn terrazzo_tiles::PaintSource> { unimplemented!() }
//! let pool = Rc::new(RefCell::new(ResourcePool::default()));
//! let manager = TileManager::with_immediate_worker(paint(), pool);
//!
//! let state = GlobalPriorityState::new(
//!     TreePriority::SamePriorityForBothTrees,
//!     &MemoryPolicy::default(),
//!     32,
//! );
//! let tiles = Vec::new(); // gathered from both trees' tilings
//! manager.prepare_tiles(&state, &tiles);
//! ```

mod cancel;
mod manager;
mod queues;
mod state;
mod tasks;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use manager::{TileManager, TileManagerStats};
pub use queues::{EvictionQueue, RasterQueue};
pub use state::GlobalPriorityState;
pub use tasks::{
    ImmediateRasterWorker, RasterCompletion, RasterOutcome, RasterTask, RasterWorker,
    ThreadedRasterWorker, WorkerPoolConfig,
};
