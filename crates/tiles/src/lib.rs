//! Tile entities and single-scale tilings.
//!
//! This crate provides the building blocks of the raster cache: the shared
//! [`Tile`] entity with its per-tree priority slots and raster-mode versions,
//! the [`TileGrid`] index math, the single-scale [`Tiling`] with priority
//! assignment and twin-tree tile sharing, and the exact-partition
//! [`CoverageIterator`] used for draw-quad emission, eviction scans and
//! occlusion scans.
//!
//! Everything here is single-threaded by design: tiles are `Rc`-shared and
//! keep their mutable state in `Cell`s. The only thread boundary in the
//! system is the raster worker seam, which lives in the scheduler crate.

mod coverage;
mod grid;
mod paint;
mod priority;
mod tile;
mod tiling;

pub use coverage::{CoverageIterator, TileCoverage};
pub use grid::{CellKey, GridDifferenceIter, GridIter, TileGrid};
pub use paint::{Color, PaintSource, RasterCanvas, RegionAnalysis};
pub use priority::{PriorityBin, TilePriority, TileResolution, TreePriority, WhichTree};
pub use tile::{
    LayerId, RasterMode, RasterTaskId, ResourceHandle, ResourceReleaser, Tile, TileId, TileInfo,
    TileVersion, NUM_RASTER_MODES, RASTER_MODES,
};
pub use tiling::{Occlusion, PriorityContext, TileFactory, Tiling, TilingParams};
