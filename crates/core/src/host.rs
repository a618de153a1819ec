//! The per-frame orchestration host.
//!
//! `TileEngine` drives the whole pipeline once per update signal: scale
//! selection on each layer's pending generation, tile priority assignment
//! on both trees, activation-readiness marking, queue rebuild and
//! budget-bounded scheduling through the tile manager, and finally — when
//! the embedder asks — activation. It also emits draw quads from the active
//! tree with exact geometric coverage.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use terrazzo_cache::{MemoryPolicy, MemoryPressure, ResourcePool};
use terrazzo_geometry::Rect;
use terrazzo_layer::{
    scales_equal, CoverageEntry, LayerPair, LayerProperties, PriorityInputs, ScaleInputs,
    TilingConfig, TilingError,
};
use terrazzo_scheduler::{GlobalPriorityState, TileManager, WorkerPoolConfig};
use terrazzo_tiles::{LayerId, Occlusion, PaintSource, WhichTree};

use crate::frame::{DrawCounters, FrameInputs, LayerFrameInputs};

struct LayerEntry {
    pair: LayerPair,
    /// Opaque-above content per tree, refreshed by the embedder.
    occlusion: [Option<Occlusion>; 2],
    /// Tiling scales drawn by the last quad emission; the cleanup pass
    /// keeps these alive mid-transition.
    used_scales: Vec<f32>,
}

/// The tiled raster cache and priority scheduler, one instance per
/// compositor.
pub struct TileEngine {
    config: TilingConfig,
    memory_policy: MemoryPolicy,
    pool: Rc<RefCell<ResourcePool>>,
    manager: TileManager,
    layers: Vec<LayerEntry>,
    pinch_active: bool,
    require_high_res_to_draw: bool,
}

impl TileEngine {
    /// Create an engine that rasterizes synchronously on the scheduling
    /// thread.
    pub fn new(
        paint: Arc<dyn PaintSource>,
        config: TilingConfig,
        memory_policy: MemoryPolicy,
    ) -> Self {
        let pool = Rc::new(RefCell::new(ResourcePool::new(
            memory_policy.resource_limits(),
        )));
        let manager = TileManager::with_immediate_worker(paint, Rc::clone(&pool));
        Self {
            config,
            memory_policy,
            pool,
            manager,
            layers: Vec::new(),
            pinch_active: false,
            require_high_res_to_draw: false,
        }
    }

    /// Create an engine backed by a raster worker thread pool.
    pub fn with_worker_pool(
        paint: Arc<dyn PaintSource>,
        config: TilingConfig,
        memory_policy: MemoryPolicy,
        worker_config: WorkerPoolConfig,
    ) -> Self {
        let pool = Rc::new(RefCell::new(ResourcePool::new(
            memory_policy.resource_limits(),
        )));
        let manager =
            TileManager::with_threaded_worker(paint, Rc::clone(&pool), worker_config);
        Self {
            config,
            memory_policy,
            pool,
            manager,
            layers: Vec::new(),
            pinch_active: false,
            require_high_res_to_draw: false,
        }
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    pub fn manager(&self) -> &TileManager {
        &self.manager
    }

    /// Register a layer (or replace the properties of an existing one for
    /// its next generation).
    pub fn create_layer(&mut self, properties: LayerProperties) {
        match self.entry_mut(properties.layer_id) {
            Some(entry) => entry.pair.set_properties(properties),
            None => self.layers.push(LayerEntry {
                pair: LayerPair::new(properties, self.config),
                occlusion: [None, None],
                used_scales: Vec::new(),
            }),
        }
    }

    /// Destroy a layer and both of its generations. Backing resources are
    /// released as the tiles drop.
    pub fn remove_layer(&mut self, layer_id: LayerId) {
        self.layers
            .retain(|entry| entry.pair.properties().layer_id != layer_id);
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, layer_id: LayerId) -> Option<&LayerPair> {
        self.layers
            .iter()
            .find(|entry| entry.pair.properties().layer_id == layer_id)
            .map(|entry| &entry.pair)
    }

    /// Accumulate invalidation damage on a layer's pending generation.
    pub fn invalidate_layer(&mut self, layer_id: LayerId, layer_rect: Rect) {
        if let Some(entry) = self.entry_mut(layer_id) {
            if entry.pair.ensure_pending().is_ok() {
                entry.pair.invalidate_pending(layer_rect);
            }
        }
    }

    /// Supply the opaque-above region for one tree of a layer. Occlusion is
    /// evaluated independently per tree.
    pub fn set_layer_occlusion(
        &mut self,
        layer_id: LayerId,
        tree: WhichTree,
        occlusion: Option<Occlusion>,
    ) {
        if let Some(entry) = self.entry_mut(layer_id) {
            entry.occlusion[tree.index()] = occlusion;
        }
    }

    /// Pinch gesture signals from the input pipeline.
    pub fn pinch_gesture_begin(&mut self) {
        self.pinch_active = true;
    }

    pub fn pinch_gesture_end(&mut self) {
        self.pinch_active = false;
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch_active
    }

    /// Force every visible pending high-res tile to be required before the
    /// next activation (e.g. after returning from a resourceless state).
    pub fn set_require_high_res_to_draw(&mut self, require: bool) {
        self.require_high_res_to_draw = require;
    }

    /// Replace the memory policy for subsequent passes.
    pub fn set_memory_policy(&mut self, policy: MemoryPolicy) {
        self.memory_policy = policy;
        self.pool.borrow_mut().set_limits(policy.resource_limits());
    }

    pub fn memory_pressure(&self) -> MemoryPressure {
        self.memory_policy
            .pressure(self.pool.borrow().bytes_allocated())
    }

    /// Run one update cycle: scale selection, priority assignment,
    /// activation-readiness marking, then eviction and raster scheduling
    /// against the memory budget.
    pub fn update(
        &mut self,
        frame: &FrameInputs,
        layer_inputs: &[LayerFrameInputs],
    ) -> Result<(), TilingError> {
        self.manager.check_for_completed_tasks();

        for inputs in layer_inputs {
            let pinch_active = self.pinch_active;
            let require_high_res = self.require_high_res_to_draw;
            let manager = &self.manager;
            let Some(entry) = self
                .layers
                .iter_mut()
                .find(|entry| entry.pair.properties().layer_id == inputs.layer_id)
            else {
                continue;
            };
            let LayerEntry {
                pair,
                occlusion,
                used_scales,
            } = entry;

            pair.ensure_pending()?;

            let scale_inputs = ScaleInputs {
                ideal_source_scale: inputs.ideal_source_scale,
                device_scale: frame.device_scale,
                page_scale: frame.page_scale,
                is_pinching: pinch_active,
                is_animating: inputs.is_animating,
                maximum_animation_scale: inputs.maximum_animation_scale,
                gpu_rasterization: frame.gpu_rasterization,
                viewport_size: frame.viewport.size,
            };

            let pending = pair.pending_mut().expect("pending generation exists");
            let ideal = pending.update_tilings(&scale_inputs)?;

            let pending_inputs = PriorityInputs {
                visible_rect_in_layer: inputs.visible_rect_in_layer,
                priority_rect_in_layer: inputs.priority_rect(),
                ideal_contents_scale: ideal,
                occlusion: occlusion[WhichTree::Pending.index()].as_ref(),
                resourceless_draw: frame.resourceless_draw,
            };
            pair.update_pending_priorities(&pending_inputs, manager);

            let active_inputs = PriorityInputs {
                occlusion: occlusion[WhichTree::Active.index()].as_ref(),
                ..pending_inputs
            };
            pair.update_active_priorities(&active_inputs, manager);

            if let Some(active) = pair.active_mut() {
                active.clean_up_tilings(ideal, used_scales);
            }

            pair.mark_required_for_activation(require_high_res);
        }

        let state = GlobalPriorityState::new(
            frame.tree_priority,
            &self.memory_policy,
            self.config.max_raster_tasks_per_pass,
        );
        let tiles: Vec<_> = self
            .layers
            .iter()
            .flat_map(|entry| entry.pair.all_tiles())
            .collect();
        self.manager.prepare_tiles(&state, &tiles);
        Ok(())
    }

    /// Apply any raster completions delivered since the last call. Returns
    /// the number applied.
    pub fn check_for_completed_tasks(&mut self) -> usize {
        self.manager.check_for_completed_tasks()
    }

    /// True when every layer's required-for-activation tiles are ready.
    pub fn is_ready_to_activate(&self) -> bool {
        self.layers.iter().all(|entry| {
            entry.pair.pending().is_none() || entry.pair.is_ready_to_activate()
        })
    }

    /// Activate every layer: pending generations become active, prior
    /// active generations are destroyed (their exclusively owned tiles with
    /// them).
    pub fn activate(&mut self) {
        self.manager.check_for_completed_tasks();
        for entry in &mut self.layers {
            entry.pair.activate();
        }
    }

    /// Emit draw quads for a layer's active generation over `dest_rect` at
    /// `dest_scale`.
    ///
    /// Coverage is geometrically exact: cells without a ready tile yield
    /// placeholder entries rather than holes, counted in the returned
    /// counters. Also records which tiling scales were drawn so the next
    /// cleanup pass retains them.
    pub fn emit_quads(
        &mut self,
        layer_id: LayerId,
        dest_scale: f32,
        dest_rect: Rect,
    ) -> Option<(Vec<CoverageEntry>, DrawCounters)> {
        let entry = self
            .layers
            .iter_mut()
            .find(|entry| entry.pair.properties().layer_id == layer_id)?;
        let active = entry.pair.active()?;
        let coverage = active.coverage(dest_scale, dest_rect)?;
        let ideal_scale = active.raster_contents_scale();

        let mut counters = DrawCounters::default();
        let mut used_scales: Vec<f32> = Vec::new();
        let entries: Vec<CoverageEntry> = coverage.collect();
        for quad in &entries {
            counters.quads += 1;
            match &quad.tile {
                None => counters.missing_tiles += 1,
                Some(tile) => {
                    let scale = tile.contents_scale();
                    if !scales_equal(scale, ideal_scale) {
                        counters.incomplete_tiles += 1;
                    }
                    if !used_scales.iter().any(|&used| scales_equal(used, scale)) {
                        used_scales.push(scale);
                    }
                }
            }
        }

        if counters.missing_tiles > 0 {
            log::debug!(
                "layer {layer_id}: {} placeholder quads this draw",
                counters.missing_tiles
            );
        }

        entry.used_scales = used_scales;
        Some((entries, counters))
    }

    /// Full reset on resource loss: every tiling on every generation is
    /// dropped, releasing all backing resources. Late raster completions
    /// for the destroyed tiles are discarded as stale.
    pub fn on_resource_loss(&mut self) {
        log::warn!("resource loss: resetting all tiling state");
        for entry in &mut self.layers {
            entry.pair.reset_tilings();
            entry.used_scales.clear();
        }
    }

    /// Serializable snapshot of engine state for debugging.
    pub fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "layers": self.layers.len(),
            "pinch_active": self.pinch_active,
            "memory_pressure": self.memory_pressure(),
            "manager": self.manager.debug_state(),
        })
    }

    fn entry_mut(&mut self, layer_id: LayerId) -> Option<&mut LayerEntry> {
        self.layers
            .iter_mut()
            .find(|entry| entry.pair.properties().layer_id == layer_id)
    }
}

impl std::fmt::Debug for TileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileEngine")
            .field("layers", &self.layers.len())
            .field("pinch_active", &self.pinch_active)
            .finish()
    }
}
