//! Per-tile, per-tree priority model.
//!
//! Every tile carries one priority slot per tree (active and pending). A
//! priority is a bin (how urgently the tile must be rasterized), a distance
//! to the visible area, and the resolution of the tiling that assigned it.
//! Scheduling passes consume priorities through a tree-priority mode that
//! picks one slot or combines both.

use serde::{Deserialize, Serialize};

use terrazzo_geometry::clamp_non_negative;

/// Which of the two layer trees a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhichTree {
    Active = 0,
    Pending = 1,
}

impl WhichTree {
    /// Index into per-tree slot arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The other tree.
    pub fn twin(self) -> WhichTree {
        match self {
            WhichTree::Active => WhichTree::Pending,
            WhichTree::Pending => WhichTree::Active,
        }
    }
}

/// Global scheduling mode deciding which tree's priorities dominate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreePriority {
    /// Prefer keeping the currently displayed content smooth: the active
    /// tree's priorities win.
    SmoothnessTakesPriority,
    /// Prefer getting new content on screen: the pending tree's priorities
    /// win.
    NewContentTakesPriority,
    /// Treat both trees equally by combining their slots.
    #[default]
    SamePriorityForBothTrees,
}

/// How urgently a tile needs rasterization.
///
/// Ordering matters: `Now < Soon < Eventually`, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityBin {
    /// Needed for the current frame.
    Now = 0,
    /// Needed shortly (just outside the visible area).
    Soon = 1,
    /// Worth keeping around, rasterized only with leftover budget.
    Eventually = 2,
}

/// The resolution role of the tiling a priority was assigned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileResolution {
    LowResolution,
    HighResolution,
    NonIdeal,
}

impl TileResolution {
    /// Rank for tie-breaking: high resolution sorts before low, low before
    /// non-ideal.
    pub fn rank(self) -> u8 {
        match self {
            TileResolution::HighResolution => 0,
            TileResolution::LowResolution => 1,
            TileResolution::NonIdeal => 2,
        }
    }
}

/// One tree's priority for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilePriority {
    pub resolution: TileResolution,
    pub bin: PriorityBin,
    /// Screen-space Manhattan distance from the tile to the visible area.
    /// Always finite and non-negative once constructed.
    pub distance_to_visible: f32,
    /// Set on pending-tree priorities for tiles that must be ready before
    /// activation. Never auto-expired; recomputed every readiness pass.
    pub required_for_activation: bool,
}

impl Default for TilePriority {
    fn default() -> Self {
        Self {
            resolution: TileResolution::NonIdeal,
            bin: PriorityBin::Eventually,
            distance_to_visible: f32::MAX,
            required_for_activation: false,
        }
    }
}

impl TilePriority {
    /// Create a priority, defensively clamping the distance.
    pub fn new(resolution: TileResolution, bin: PriorityBin, distance_to_visible: f32) -> Self {
        Self {
            resolution,
            bin,
            distance_to_visible: clamp_non_negative(distance_to_visible),
            required_for_activation: false,
        }
    }

    /// Combine the active and pending slots into one priority, taking the
    /// more urgent bin and the smaller distance. The resolution follows the
    /// slot that supplied the more urgent bin.
    pub fn combined(active: &TilePriority, pending: &TilePriority) -> TilePriority {
        let resolution = if active.bin < pending.bin {
            active.resolution
        } else if pending.bin < active.bin {
            pending.resolution
        } else if active.distance_to_visible <= pending.distance_to_visible {
            active.resolution
        } else {
            pending.resolution
        };
        TilePriority {
            resolution,
            bin: active.bin.min(pending.bin),
            distance_to_visible: active.distance_to_visible.min(pending.distance_to_visible),
            required_for_activation: active.required_for_activation
                || pending.required_for_activation,
        }
    }

    /// True if this priority should be serviced before `other`.
    pub fn is_higher_priority_than(&self, other: &TilePriority) -> bool {
        self.bin < other.bin
            || (self.bin == other.bin && self.distance_to_visible < other.distance_to_visible)
    }
}
