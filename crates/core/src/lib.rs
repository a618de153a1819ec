//! Tiled raster cache and priority scheduler.
//!
//! `terrazzo-core` ties the workspace together into the per-frame control
//! loop: viewport and scale inputs arrive, each layer's tiling set re-runs
//! scale selection, tile priorities are recomputed from visibility and
//! occlusion, the raster and eviction queues are rebuilt, the scheduler
//! evicts and schedules against the memory budget, and — once the pending
//! tree is ready — activation swaps the generations.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use terrazzo_cache::MemoryPolicy;
//! use terrazzo_core::{FrameInputs, LayerFrameInputs, TileEngine};
//! use terrazzo_geometry::{Rect, Size};
//! use terrazzo_layer::{LayerProperties, TilingConfig};
//!
//! # fn paint() -> Arc<dyn terrazzo_tiles::PaintSource> { unimplemented!() }
//! let mut engine = TileEngine::new(paint(), TilingConfig::default(), MemoryPolicy::default());
//! engine.create_layer(LayerProperties {
//!     layer_id: 1,
//!     bounds: Size::new(2000, 2000),
//!     has_content: true,
//!     is_mask: false,
//!     is_opaque: true,
//!     has_text: false,
//! });
//!
//! let frame = FrameInputs::default();
//! let layers = [LayerFrameInputs::new(1, Rect::new(0, 0, 1920, 1080))];
//! engine.update(&frame, &layers).unwrap();
//!
//! if engine.is_ready_to_activate() {
//!     engine.activate();
//! }
//! let (quads, counters) = engine.emit_quads(1, 1.0, Rect::new(0, 0, 1920, 1080)).unwrap();
//! assert_eq!(counters.quads, quads.len());
//! ```

mod frame;
mod host;

pub use frame::{DrawCounters, FrameInputs, LayerFrameInputs};
pub use host::TileEngine;

// Re-export the vocabulary types embedders need at the API surface.
pub use terrazzo_cache::{MemoryPolicy, MemoryPressure};
pub use terrazzo_layer::{CoverageEntry, LayerProperties, TilingConfig, TilingError};
pub use terrazzo_tiles::{LayerId, Occlusion, PaintSource, TreePriority, WhichTree};
