//! Per-tree layer state and raster scale selection.
//!
//! A `LayerTilings` is one generation (active or pending) of a layer's
//! tiling state: its tiling set, accumulated invalidation, and the raster
//! scale policy that decides which resolutions exist. The policy balances
//! three regimes: steady state (track the ideal scale within a tolerance
//! window), pinch gestures (bounded-ratio stepping with snapping to
//! existing tilings), and transform animations (one fixed scale unless GPU
//! rasterization makes continuous re-raster cheap and the content has no
//! text).

use terrazzo_geometry::{clamp_non_negative, Rect, Region, Size};
use terrazzo_tiles::{LayerId, Occlusion, PriorityContext, TileFactory, Tiling, WhichTree};

use crate::config::{scales_equal, TilingConfig};
use crate::tiling_set::{TilingSet, TilingSetCoverage};
use crate::TilingError;

/// Static properties of a layer, fixed per generation.
#[derive(Debug, Clone, Copy)]
pub struct LayerProperties {
    pub layer_id: LayerId,
    pub bounds: Size,
    /// False when the layer has no recorded content; such layers cannot
    /// have tilings at all.
    pub has_content: bool,
    /// Mask layers never get a low-resolution tiling.
    pub is_mask: bool,
    pub is_opaque: bool,
    pub has_text: bool,
}

/// Per-update scale inputs from the frame/gesture scheduler.
#[derive(Debug, Clone, Copy)]
pub struct ScaleInputs {
    /// The layer-requested scale (e.g. from transforms).
    pub ideal_source_scale: f32,
    pub device_scale: f32,
    pub page_scale: f32,
    /// True between pinch-begin and pinch-end signals.
    pub is_pinching: bool,
    /// True while a transform animation affects this layer.
    pub is_animating: bool,
    /// The largest scale the running animation will reach, or 0 if unknown.
    pub maximum_animation_scale: f32,
    pub gpu_rasterization: bool,
    /// Viewport size in device pixels, for the animation footprint check.
    pub viewport_size: Size,
}

impl Default for ScaleInputs {
    fn default() -> Self {
        Self {
            ideal_source_scale: 1.0,
            device_scale: 1.0,
            page_scale: 1.0,
            is_pinching: false,
            is_animating: false,
            maximum_animation_scale: 0.0,
            gpu_rasterization: false,
            viewport_size: Size::new(1920, 1080),
        }
    }
}

/// Per-update priority inputs.
#[derive(Debug, Clone, Copy)]
pub struct PriorityInputs<'a> {
    /// The rect of the layer being drawn this frame, in layer space.
    pub visible_rect_in_layer: Rect,
    /// The rect to prioritize around; usually the visible rect, optionally
    /// biased by scroll prediction.
    pub priority_rect_in_layer: Rect,
    pub ideal_contents_scale: f32,
    /// Opaque content above this layer, for this tree.
    pub occlusion: Option<&'a Occlusion>,
    /// True during resourceless/software draws: priority rects must keep
    /// their previous values.
    pub resourceless_draw: bool,
}

/// One generation of a layer's tiling state.
pub struct LayerTilings {
    properties: LayerProperties,
    tree: WhichTree,
    config: TilingConfig,
    invalidation: Region,
    tilings: Option<TilingSet>,

    raster_contents_scale: f32,
    low_res_raster_scale: f32,
    raster_page_scale: f32,
    raster_device_scale: f32,
    raster_source_scale: f32,
    was_animating: bool,
}

impl LayerTilings {
    /// Create the tiling state for one tree of a layer.
    pub fn new(properties: LayerProperties, tree: WhichTree, config: TilingConfig) -> Self {
        Self {
            properties,
            tree,
            config,
            invalidation: Region::new(),
            tilings: None,
            raster_contents_scale: 0.0,
            low_res_raster_scale: 0.0,
            raster_page_scale: 0.0,
            raster_device_scale: 0.0,
            raster_source_scale: 0.0,
            was_animating: false,
        }
    }

    pub fn layer_id(&self) -> LayerId {
        self.properties.layer_id
    }

    pub fn tree(&self) -> WhichTree {
        self.tree
    }

    pub fn bounds(&self) -> Size {
        self.properties.bounds
    }

    pub fn properties(&self) -> &LayerProperties {
        &self.properties
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    pub fn invalidation(&self) -> &Region {
        &self.invalidation
    }

    pub fn tilings(&self) -> Option<&TilingSet> {
        self.tilings.as_ref()
    }

    pub fn tilings_mut(&mut self) -> Option<&mut TilingSet> {
        self.tilings.as_mut()
    }

    pub fn raster_contents_scale(&self) -> f32 {
        self.raster_contents_scale
    }

    pub fn low_res_raster_scale(&self) -> f32 {
        self.low_res_raster_scale
    }

    /// The validity predicate callers must check before any tiling API:
    /// zero-size layers and layers without content never get tilings.
    pub fn can_have_tilings(&self) -> bool {
        self.properties.has_content && !self.properties.bounds.is_empty()
    }

    /// The floor for contents scales: below `1 / min_dimension` the layer
    /// would scale to less than one pixel of content.
    pub fn minimum_contents_scale(&self) -> f32 {
        let min_dimension = self
            .properties
            .bounds
            .width
            .min(self.properties.bounds.height);
        if min_dimension <= 0 {
            self.config.minimum_contents_scale
        } else {
            self.config
                .minimum_contents_scale
                .max(1.0 / min_dimension as f32)
        }
    }

    /// The scale content would ideally be rasterized at this update.
    pub fn ideal_contents_scale(&self, inputs: &ScaleInputs) -> f32 {
        let ideal = clamp_non_negative(
            inputs.device_scale * inputs.page_scale * inputs.ideal_source_scale,
        );
        ideal.max(self.minimum_contents_scale())
    }

    /// Accumulate invalidation damage for the next update.
    pub fn invalidate(&mut self, layer_rect: Rect) {
        self.invalidation.union(layer_rect);
    }

    pub fn clear_invalidation(&mut self) {
        self.invalidation.clear();
    }

    /// Resize the layer, propagating to all tilings.
    pub fn set_bounds(&mut self, bounds: Size) {
        self.properties.bounds = bounds;
        if let Some(tilings) = &mut self.tilings {
            tilings.set_layer_bounds(bounds);
        }
    }

    /// Run the scale-selection pass: decide the raster scales and make the
    /// tiling set match (create high/low-res tilings, retag resolutions).
    ///
    /// Returns the ideal contents scale used, for the later cleanup pass.
    pub fn update_tilings(&mut self, inputs: &ScaleInputs) -> Result<f32, TilingError> {
        if !self.can_have_tilings() {
            self.tilings = None;
            return Ok(self.minimum_contents_scale());
        }

        let ideal = self.ideal_contents_scale(inputs);

        if self.tilings.is_none() {
            self.tilings = Some(TilingSet::new(
                self.properties.layer_id,
                self.tree,
                self.properties.bounds,
                self.config,
                self.properties.is_opaque,
                self.properties.has_text,
            )?);
        }

        if self.raster_contents_scale <= 0.0 || self.should_adjust_raster_scale(inputs, ideal) {
            self.recalculate_raster_scales(inputs, ideal);
            log::debug!(
                "layer {} raster scale -> {} (ideal {})",
                self.properties.layer_id,
                self.raster_contents_scale,
                ideal
            );
        }
        self.was_animating = inputs.is_animating;

        let raster_scale = self.raster_contents_scale;
        let low_res_scale = self.low_res_raster_scale;

        // A low-resolution tiling exists only outside animations, for
        // layers spanning more than one tile, and never for masks.
        let wants_low_res = !inputs.is_animating
            && !self.properties.is_mask
            && self.spans_multiple_tiles(raster_scale);

        let tilings = self.tilings.as_mut().expect("tiling set exists");

        if tilings.tiling_at_scale(raster_scale).is_none() {
            tilings.add_tiling(raster_scale)?;
        }
        tilings.mark_high_res(raster_scale);

        if wants_low_res {
            if tilings.tiling_at_scale(low_res_scale).is_none() {
                tilings.add_tiling(low_res_scale)?;
            }
            tilings.mark_low_res(low_res_scale);
        }

        Ok(ideal)
    }

    /// Cleanup pass: drop tilings outside the ideal/raster interval except
    /// the low-res tiling and any scale still being drawn.
    pub fn clean_up_tilings(&mut self, ideal_contents_scale: f32, used_scales: &[f32]) {
        let raster = self.raster_contents_scale;
        let low_res = if self.low_res_raster_scale > 0.0 {
            Some(self.low_res_raster_scale)
        } else {
            None
        };
        if let Some(tilings) = &mut self.tilings {
            tilings.clean_up(ideal_contents_scale, raster, used_scales, low_res);
        }
    }

    /// Recompute tile priorities on every tiling for this tree, allocating
    /// and releasing live tiles as the interest area moves. `twin` is the
    /// other tree's generation, used for tile sharing.
    pub fn update_tile_priorities(
        &mut self,
        inputs: &PriorityInputs<'_>,
        factory: &dyn TileFactory,
        twin: Option<&LayerTilings>,
    ) {
        let config = self.config;
        let invalidation = &self.invalidation;
        let Some(tilings) = self.tilings.as_mut() else {
            return;
        };

        let ctx = PriorityContext {
            visible_rect_in_layer: inputs.visible_rect_in_layer,
            priority_rect_in_layer: inputs.priority_rect_in_layer,
            ideal_contents_scale: inputs.ideal_contents_scale,
            occlusion: inputs.occlusion,
            skip_priority_rect_update: inputs.resourceless_draw,
            soon_border_px: config.soon_border_px,
            interest_border_px: config.interest_border_px,
        };

        for tiling in tilings.tilings_mut() {
            let twin_tiling = twin
                .and_then(|layer| layer.tilings())
                .and_then(|set| set.tiling_at_scale(tiling.contents_scale()));
            tiling.update_priorities(&ctx, factory, invalidation, twin_tiling);
        }
    }

    /// Cross-scale coverage for quad emission.
    pub fn coverage(&self, dest_scale: f32, dest_rect: Rect) -> Option<TilingSetCoverage> {
        self.tilings
            .as_ref()
            .map(|tilings| tilings.coverage(dest_scale, dest_rect))
    }

    /// The high-resolution tiling, if one exists.
    pub fn high_res_tiling(&self) -> Option<&Tiling> {
        self.tilings.as_ref().and_then(TilingSet::high_res_tiling)
    }

    pub fn low_res_tiling(&self) -> Option<&Tiling> {
        self.tilings.as_ref().and_then(TilingSet::low_res_tiling)
    }

    /// Total live tiles across all tilings.
    pub fn tile_count(&self) -> usize {
        self.tilings
            .as_ref()
            .map(|tilings| tilings.tilings().map(Tiling::tile_count).sum())
            .unwrap_or(0)
    }

    /// Re-home this generation to the other tree.
    pub(crate) fn set_tree(&mut self, tree: WhichTree) {
        self.tree = tree;
        if let Some(tilings) = &mut self.tilings {
            tilings.set_tree(tree);
        }
    }

    /// Copy the raster scale decisions from the twin so the pending tree
    /// starts from the active tree's state instead of recomputing from
    /// scratch.
    pub(crate) fn adopt_raster_scales(&mut self, twin: &LayerTilings) {
        self.raster_contents_scale = twin.raster_contents_scale;
        self.low_res_raster_scale = twin.low_res_raster_scale;
        self.raster_page_scale = twin.raster_page_scale;
        self.raster_device_scale = twin.raster_device_scale;
        self.raster_source_scale = twin.raster_source_scale;
    }

    pub(crate) fn ensure_tiling_set(&mut self) -> Result<&mut TilingSet, TilingError> {
        if !self.can_have_tilings() {
            return Err(TilingError::EmptyLayerBounds);
        }
        if self.tilings.is_none() {
            self.tilings = Some(TilingSet::new(
                self.properties.layer_id,
                self.tree,
                self.properties.bounds,
                self.config,
                self.properties.is_opaque,
                self.properties.has_text,
            )?);
        }
        Ok(self.tilings.as_mut().expect("just created"))
    }

    fn spans_multiple_tiles(&self, raster_scale: f32) -> bool {
        let content_bounds = self.properties.bounds.scale_ceil(raster_scale);
        let tile_size = self.config.tile_size_for(content_bounds);
        content_bounds.width > tile_size.width || content_bounds.height > tile_size.height
    }

    fn should_adjust_raster_scale(&self, inputs: &ScaleInputs, ideal: f32) -> bool {
        // Entering or leaving an animation always re-evaluates.
        if self.was_animating != inputs.is_animating {
            return true;
        }

        if inputs.is_animating {
            // GPU rasterization without text re-rasters continuously at the
            // current scale; otherwise the scale is pinned for the whole
            // animation.
            return inputs.gpu_rasterization
                && !self.properties.has_text
                && !scales_equal(self.raster_contents_scale, ideal);
        }

        if inputs.is_pinching && self.raster_contents_scale > 0.0 {
            // Zooming out needs a lower-res tiling immediately; zooming in
            // only once the ideal has drifted beyond the max ratio.
            let ratio = ideal / self.raster_contents_scale;
            return self.raster_contents_scale > ideal || ratio > self.config.max_pinch_ratio;
        }

        // Steady state: keep the current scale within the tolerance window.
        let ratio = ideal / self.raster_contents_scale;
        (ratio - 1.0).abs() > self.config.scale_tolerance
    }

    fn recalculate_raster_scales(&mut self, inputs: &ScaleInputs, ideal: f32) {
        if inputs.is_pinching && self.raster_contents_scale > 0.0 {
            let zooming_out = self.raster_contents_scale > ideal;
            let desired = if zooming_out {
                self.raster_contents_scale / self.config.max_pinch_ratio
            } else {
                self.raster_contents_scale * self.config.max_pinch_ratio
            };
            self.raster_contents_scale = self.snapped_scale(desired);
        } else {
            self.raster_contents_scale = ideal;
        }

        if inputs.is_animating && !(inputs.gpu_rasterization && !self.properties.has_text) {
            // One fixed scale for the whole animation: the larger of the
            // scale at animation start and the maximum animation scale,
            // unless the footprint at that scale exceeds the viewport.
            let max_animation_scale = clamp_non_negative(inputs.maximum_animation_scale);
            let candidate = ideal.max(max_animation_scale);
            let footprint = self.properties.bounds.scale_ceil(candidate);
            let fits = footprint.area() <= inputs.viewport_size.area();
            self.raster_contents_scale = if max_animation_scale > 0.0 && fits {
                candidate
            } else {
                ideal
            };
        }

        self.raster_contents_scale = self.raster_contents_scale.max(self.minimum_contents_scale());
        self.low_res_raster_scale = self.raster_contents_scale * self.config.low_res_factor;
        self.raster_page_scale = inputs.page_scale;
        self.raster_device_scale = inputs.device_scale;
        self.raster_source_scale = inputs.ideal_source_scale;
    }

    /// Snap a desired pinch scale to an existing tiling within the snap
    /// ratio. This reuses a low-resolution tiling as the new
    /// high-resolution one when it is close enough.
    fn snapped_scale(&self, desired: f32) -> f32 {
        let Some(tilings) = &self.tilings else {
            return desired;
        };
        let mut best = desired;
        let mut best_ratio = self.config.pinch_snap_ratio;
        for tiling in tilings.tilings() {
            let scale = tiling.contents_scale();
            let ratio = (scale / desired).max(desired / scale);
            if ratio < best_ratio {
                best = scale;
                best_ratio = ratio;
            }
        }
        best
    }
}

impl std::fmt::Debug for LayerTilings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerTilings")
            .field("layer_id", &self.properties.layer_id)
            .field("tree", &self.tree)
            .field("bounds", &self.properties.bounds)
            .field("raster_contents_scale", &self.raster_contents_scale)
            .field("num_tilings", &self.tilings.as_ref().map(TilingSet::num_tilings))
            .finish()
    }
}
