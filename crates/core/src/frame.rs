//! Per-frame inputs from the frame/gesture scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use terrazzo_geometry::Rect;
use terrazzo_tiles::{LayerId, TreePriority};

/// Global inputs for one update cycle.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    /// Monotonic frame time supplied by the frame scheduler.
    pub frame_time: Duration,
    pub device_scale: f32,
    pub page_scale: f32,
    /// Viewport size in device pixels, used by the animation footprint
    /// check.
    pub viewport: Rect,
    /// True for software/resourceless draw passes: priority rects must keep
    /// their previous values so transient draw states cannot thrash
    /// priorities.
    pub resourceless_draw: bool,
    pub tree_priority: TreePriority,
    pub gpu_rasterization: bool,
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            frame_time: Duration::ZERO,
            device_scale: 1.0,
            page_scale: 1.0,
            viewport: Rect::new(0, 0, 1920, 1080),
            resourceless_draw: false,
            tree_priority: TreePriority::default(),
            gpu_rasterization: false,
        }
    }
}

/// Per-layer inputs for one update cycle.
#[derive(Debug, Clone, Copy)]
pub struct LayerFrameInputs {
    pub layer_id: LayerId,
    /// The portion of the layer drawn this frame, in layer space.
    pub visible_rect_in_layer: Rect,
    /// The rect to prioritize around; defaults to the visible rect. Kept
    /// separate so prefetch can be biased (e.g. by scroll prediction)
    /// without changing what is drawn.
    pub priority_rect_in_layer: Option<Rect>,
    /// The layer-requested scale from its transforms.
    pub ideal_source_scale: f32,
    /// True while a transform animation affects this layer.
    pub is_animating: bool,
    /// Largest scale the running animation will reach, 0 if unknown.
    pub maximum_animation_scale: f32,
}

impl LayerFrameInputs {
    pub fn new(layer_id: LayerId, visible_rect_in_layer: Rect) -> Self {
        Self {
            layer_id,
            visible_rect_in_layer,
            priority_rect_in_layer: None,
            ideal_source_scale: 1.0,
            is_animating: false,
            maximum_animation_scale: 0.0,
        }
    }

    pub fn priority_rect(&self) -> Rect {
        self.priority_rect_in_layer
            .unwrap_or(self.visible_rect_in_layer)
    }
}

/// Counters from one quad-emission pass. Resource exhaustion surfaces here
/// rather than as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawCounters {
    /// Grid cells with no tile at all: drawn as placeholder quads.
    pub missing_tiles: usize,
    /// Quads served by a tiling other than the ideal resolution.
    pub incomplete_tiles: usize,
    /// Total quads emitted.
    pub quads: usize,
}
