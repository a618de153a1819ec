//! Multi-scale tiling policy for layers.
//!
//! This crate maintains the set of tilings for each layer — which
//! resolutions exist, which is the high-resolution target and which the
//! low-resolution fallback — and the double-buffered (pending/active)
//! generation model: bootstrapping a pending layer from its active twin,
//! deciding which tiles must be ready before activation, and performing the
//! activation handoff itself.
//!
//! Scale selection is heuristic-driven: steady-state updates track the
//! ideal scale within a tolerance window, pinch gestures step the raster
//! scale by a bounded ratio (snapping to existing tilings), and transform
//! animations pin one scale for their whole duration unless GPU
//! rasterization makes continuous re-raster viable.

mod config;
mod layer;
mod sync;
mod tiling_set;

use thiserror::Error;

pub use config::{scales_equal, TilingConfig};
pub use layer::{LayerProperties, LayerTilings, PriorityInputs, ScaleInputs};
pub use sync::{mark_tiles_required_for_activation, sync_pending_from_active, LayerPair};
pub use tiling_set::{CoverageEntry, TilingSet, TilingSetCoverage};

/// Errors from tiling-set construction and mutation.
///
/// These guard the up-front validity predicate: callers must not invoke
/// tiling APIs for layers that cannot have tilings.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TilingError {
    /// The layer has zero-size bounds.
    #[error("layer bounds are empty")]
    EmptyLayerBounds,
    /// The contents scale is non-finite, non-positive, or scales the layer
    /// to nothing.
    #[error("contents scale {0} is invalid for this layer")]
    InvalidScale(f32),
    /// A tiling at this scale already exists in the set.
    #[error("a tiling at scale {0} already exists")]
    DuplicateScale(f32),
}
