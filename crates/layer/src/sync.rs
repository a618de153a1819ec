//! Dual-tree synchronization and activation.
//!
//! A layer exists as two generations: the active one being displayed and
//! the pending one being prepared. The pending generation bootstraps its
//! tiling set from the active twin (sharing uninvalidated tiles), is marked
//! up with required-for-activation flags immediately before activation, and
//! finally replaces the active generation — destroying tiles owned
//! exclusively by the generation it replaces.

use terrazzo_geometry::Rect;
use terrazzo_tiles::{TileResolution, Tiling, WhichTree};

use crate::config::{scales_equal, TilingConfig};
use crate::layer::{LayerProperties, LayerTilings};
use crate::TilingError;

/// Bootstrap the pending generation's tiling set from its active twin.
///
/// Every scale present on the active layer is recreated on pending, except
/// scales below the pending layer's minimum contents scale, which are
/// dropped — but if dropping the candidate high-resolution tiling would
/// leave none, a replacement is created at the minimum scale so a
/// high-resolution tiling always exists after sync. Tiles themselves are
/// shared lazily when pending cells are populated.
pub fn sync_pending_from_active(
    pending: &mut LayerTilings,
    active: &LayerTilings,
) -> Result<(), TilingError> {
    if !pending.can_have_tilings() {
        return Ok(());
    }

    pending.adopt_raster_scales(active);
    let minimum_scale = pending.minimum_contents_scale();

    let active_scales: Vec<(f32, TileResolution)> = active
        .tilings()
        .map(|set| {
            set.tilings()
                .map(|tiling| (tiling.contents_scale(), tiling.resolution()))
                .collect()
        })
        .unwrap_or_default();

    let pending_set = pending.ensure_tiling_set()?;

    let mut high_res_scale = None;
    for &(scale, resolution) in &active_scales {
        if scale < minimum_scale && !scales_equal(scale, minimum_scale) {
            // Too small for the pending layer's bounds; remember whether we
            // just dropped the high-res candidate.
            if resolution == TileResolution::HighResolution {
                high_res_scale = Some(minimum_scale);
            }
            continue;
        }
        if pending_set.tiling_at_scale(scale).is_none() {
            pending_set.add_tiling(scale)?;
        }
        if resolution == TileResolution::HighResolution {
            high_res_scale = Some(scale);
        }
        if resolution == TileResolution::LowResolution {
            pending_set.mark_low_res(scale);
        }
    }

    if let Some(scale) = high_res_scale {
        if pending_set.tiling_at_scale(scale).is_none() {
            pending_set.add_tiling(scale)?;
        }
        pending_set.mark_high_res(scale);
    }

    Ok(())
}

/// Run the activation-readiness check on the pending layer, marking the
/// tiles that must be rasterized before activation may proceed.
///
/// The flags are not auto-expired; this must be re-run every pass that can
/// precede an activation. Fully occluded (for the pending tree) tiles are
/// never required. Low-resolution tiles are never required.
pub fn mark_tiles_required_for_activation(
    pending: &LayerTilings,
    active: Option<&LayerTilings>,
    require_high_res_to_draw: bool,
) {
    let pending_bounds = pending.bounds();
    let Some(high_res) = pending.high_res_tiling() else {
        return;
    };

    let active_usable = match active {
        Some(active) => active.can_have_tilings() && active.tilings().is_some(),
        None => false,
    };

    if !active_usable {
        // The active tree cannot draw this layer at all: everything visible
        // must be ready.
        mark_all_visible_required(high_res);
        return;
    }
    let active = active.expect("usable active layer");

    let geometry_differs = active.bounds() != pending_bounds;
    let active_high_res = active.high_res_tiling();
    let active_has_tiles_in_frame = active_high_res
        .map(tiling_has_tiles_in_visible_rect)
        .unwrap_or(false);
    let active_fully_ready = active_high_res
        .map(tiling_visible_tiles_ready)
        .unwrap_or(false);

    if geometry_differs
        || !active_has_tiles_in_frame
        || (require_high_res_to_draw && !active_fully_ready)
    {
        mark_all_visible_required(high_res);
        return;
    }

    // Steady state: geometry matches and the active tree is usable. Only
    // unshared tiles whose active twin is not ready need to block
    // activation; shared, already-ready tiles require nothing new.
    let visible_rect = high_res.current_visible_rect();
    for (cell, tile) in high_res.cells() {
        if !tile.content_rect().intersects(&visible_rect) {
            continue;
        }
        if tile.is_occluded(WhichTree::Pending) {
            continue;
        }
        if tile.is_shared() {
            continue;
        }
        let twin_ready = active_high_res
            .and_then(|tiling| tiling.tile_at(cell.0, cell.1))
            .map(|twin| twin.is_ready_to_draw())
            .unwrap_or(false);
        if !twin_ready {
            tile.mark_required_for_activation();
        }
    }
}

fn mark_all_visible_required(tiling: &Tiling) {
    let visible_rect = tiling.current_visible_rect();
    for tile in tiling.tiles() {
        if !tile.content_rect().intersects(&visible_rect) {
            continue;
        }
        if tile.is_occluded(WhichTree::Pending) {
            continue;
        }
        tile.mark_required_for_activation();
    }
}

fn tiling_has_tiles_in_visible_rect(tiling: &Tiling) -> bool {
    let visible_rect = tiling.current_visible_rect();
    tiling
        .tiles()
        .any(|tile| tile.content_rect().intersects(&visible_rect))
}

fn tiling_visible_tiles_ready(tiling: &Tiling) -> bool {
    let visible_rect = tiling.current_visible_rect();
    tiling
        .tiles()
        .filter(|tile| tile.content_rect().intersects(&visible_rect))
        .all(|tile| tile.is_ready_to_draw())
}

/// The two generations of one logical layer.
pub struct LayerPair {
    properties: LayerProperties,
    config: TilingConfig,
    active: Option<LayerTilings>,
    pending: Option<LayerTilings>,
}

impl LayerPair {
    /// Create a pair with no generations yet.
    pub fn new(properties: LayerProperties, config: TilingConfig) -> Self {
        Self {
            properties,
            config,
            active: None,
            pending: None,
        }
    }

    pub fn properties(&self) -> &LayerProperties {
        &self.properties
    }

    pub fn active(&self) -> Option<&LayerTilings> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut LayerTilings> {
        self.active.as_mut()
    }

    pub fn pending(&self) -> Option<&LayerTilings> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut LayerTilings> {
        self.pending.as_mut()
    }

    /// Update the layer's static properties for the next generation.
    pub fn set_properties(&mut self, properties: LayerProperties) {
        self.properties = properties;
    }

    /// Start a new update cycle: create the pending generation and
    /// bootstrap it from the active twin.
    pub fn create_pending(&mut self) -> Result<&mut LayerTilings, TilingError> {
        let mut pending =
            LayerTilings::new(self.properties, WhichTree::Pending, self.config);
        if let Some(active) = &self.active {
            sync_pending_from_active(&mut pending, active)?;
        }
        self.pending = Some(pending);
        Ok(self.pending.as_mut().expect("just created"))
    }

    /// Accumulate invalidation on the pending generation.
    pub fn invalidate_pending(&mut self, layer_rect: Rect) {
        if let Some(pending) = &mut self.pending {
            pending.invalidate(layer_rect);
        }
    }

    /// Ensure a pending generation exists for this update cycle.
    pub fn ensure_pending(&mut self) -> Result<&mut LayerTilings, TilingError> {
        if self.pending.is_none() {
            self.create_pending()?;
        }
        Ok(self.pending.as_mut().expect("pending exists"))
    }

    /// Recompute the pending generation's tile priorities, sharing tiles
    /// from the active twin where cells are uninvalidated.
    pub fn update_pending_priorities(
        &mut self,
        inputs: &crate::layer::PriorityInputs<'_>,
        factory: &dyn terrazzo_tiles::TileFactory,
    ) {
        let active = &self.active;
        if let Some(pending) = self.pending.as_mut() {
            pending.update_tile_priorities(inputs, factory, active.as_ref());
        }
    }

    /// Recompute the active generation's tile priorities.
    pub fn update_active_priorities(
        &mut self,
        inputs: &crate::layer::PriorityInputs<'_>,
        factory: &dyn terrazzo_tiles::TileFactory,
    ) {
        let pending = &self.pending;
        if let Some(active) = self.active.as_mut() {
            active.update_tile_priorities(inputs, factory, pending.as_ref());
        }
    }

    /// Collect every live tile of both generations for the scheduler.
    /// Shared tiles appear once per holder; the scheduler deduplicates.
    pub fn all_tiles(&self) -> Vec<std::rc::Rc<terrazzo_tiles::Tile>> {
        let mut tiles = Vec::new();
        for generation in [self.active.as_ref(), self.pending.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Some(set) = generation.tilings() {
                for tiling in set.tilings() {
                    tiles.extend(tiling.tiles().cloned());
                }
            }
        }
        tiles
    }

    /// Drop every tiling on both generations (full reset on resource
    /// loss). Tiles release their backing resources as they are destroyed.
    pub fn reset_tilings(&mut self) {
        for generation in [self.active.as_mut(), self.pending.as_mut()]
            .into_iter()
            .flatten()
        {
            if let Some(set) = generation.tilings_mut() {
                set.remove_all_tilings();
            }
        }
    }

    /// Run the readiness check against the current active twin.
    pub fn mark_required_for_activation(&self, require_high_res_to_draw: bool) {
        if let Some(pending) = &self.pending {
            mark_tiles_required_for_activation(
                pending,
                self.active.as_ref(),
                require_high_res_to_draw,
            );
        }
    }

    /// True when every required-for-activation tile is ready to draw.
    pub fn is_ready_to_activate(&self) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let Some(set) = pending.tilings() else {
            return true;
        };
        set.tilings().all(|tiling| {
            tiling
                .tiles()
                .filter(|tile| tile.required_for_activation())
                .all(|tile| tile.is_ready_to_draw())
        })
    }

    /// Activate: the pending generation becomes active.
    ///
    /// The prior active generation is dropped first, releasing tiles it
    /// owned exclusively (shared tiles survive through the new active's
    /// references). Each surviving tile's active slot adopts its pending
    /// priority and the pending slot resets.
    pub fn activate(&mut self) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };

        // Dropping the old generation resets its tree slot on shared tiles
        // and destroys exclusively owned ones.
        self.active = None;

        if let Some(set) = pending.tilings_mut() {
            for tiling in set.tilings_mut() {
                for tile in tiling.tiles() {
                    tile.set_priority(WhichTree::Active, tile.priority(WhichTree::Pending));
                    tile.reset_priority(WhichTree::Pending);
                    tile.set_shared(false);
                }
            }
        }
        pending.set_tree(WhichTree::Active);
        pending.clear_invalidation();

        log::debug!("layer {} activated", pending.layer_id());
        self.active = Some(pending);
    }
}

impl std::fmt::Debug for LayerPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerPair")
            .field("layer_id", &self.properties.layer_id)
            .field("has_active", &self.active.is_some())
            .field("has_pending", &self.pending.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{PriorityInputs, ScaleInputs};
    use std::cell::Cell;
    use std::rc::Rc;
    use terrazzo_geometry::Size;
    use terrazzo_tiles::{
        PriorityBin, RasterMode, Tile, TileFactory, TileId, TileInfo, TileVersion,
    };

    #[derive(Default)]
    struct CountingFactory {
        created: Cell<u64>,
    }

    impl TileFactory for CountingFactory {
        fn create_tile(&self, info: TileInfo) -> Option<Rc<Tile>> {
            let id = self.created.get();
            self.created.set(id + 1);
            Some(Rc::new(Tile::new(TileId(id), info, None)))
        }
    }

    fn properties(bounds: Size) -> LayerProperties {
        LayerProperties {
            layer_id: 1,
            bounds,
            has_content: true,
            is_mask: false,
            is_opaque: false,
            has_text: false,
        }
    }

    fn config() -> TilingConfig {
        // Force a real grid: 100x100 tiles with no untiled fast path.
        TilingConfig::default()
            .with_tile_size(Size::new(100, 100))
            .with_max_untiled_size(Size::new(100, 100))
    }

    fn priority_inputs(rect: Rect) -> PriorityInputs<'static> {
        PriorityInputs {
            visible_rect_in_layer: rect,
            priority_rect_in_layer: rect,
            ideal_contents_scale: 1.0,
            occlusion: None,
            resourceless_draw: false,
        }
    }

    /// Build a pair whose active layer is fully updated and (optionally)
    /// fully rasterized.
    fn active_pair(bounds: Size, factory: &CountingFactory, ready: bool) -> LayerPair {
        let mut pair = LayerPair::new(properties(bounds), config());
        pair.create_pending().unwrap();
        let pending = pair.pending_mut().unwrap();
        pending.update_tilings(&ScaleInputs::default()).unwrap();
        pending.update_tile_priorities(
            &priority_inputs(Rect::from_size(bounds)),
            factory,
            None,
        );
        if ready {
            mark_all_ready(pending);
        }
        pair.activate();
        pair
    }

    fn mark_all_ready(layer: &LayerTilings) {
        if let Some(set) = layer.tilings() {
            for tiling in set.tilings() {
                for tile in tiling.tiles() {
                    tile.set_version(RasterMode::HighQuality, TileVersion::SolidColor([0; 4]));
                }
            }
        }
    }

    fn required_high_res_count(layer: &LayerTilings) -> usize {
        layer
            .high_res_tiling()
            .map(|tiling| {
                tiling
                    .tiles()
                    .filter(|tile| tile.required_for_activation())
                    .count()
            })
            .unwrap_or(0)
    }

    fn required_low_res_count(layer: &LayerTilings) -> usize {
        layer
            .low_res_tiling()
            .map(|tiling| {
                tiling
                    .tiles()
                    .filter(|tile| tile.required_for_activation())
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_sync_copies_scales_from_active() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);
        let mut pair = active_pair(bounds, &factory, true);

        // The active layer has a high-res (1.0) and a low-res (0.25)
        // tiling; pending gets both.
        pair.create_pending().unwrap();
        let pending = pair.pending().unwrap();
        let set = pending.tilings().unwrap();
        assert!(set.tiling_at_scale(1.0).is_some());
        assert!(set.tiling_at_scale(0.25).is_some());
        assert_eq!(
            set.high_res_tiling().unwrap().contents_scale(),
            1.0
        );
        assert_eq!(set.low_res_tiling().unwrap().contents_scale(), 0.25);
    }

    #[test]
    fn test_sync_drops_scales_below_minimum_and_replaces_high_res() {
        let factory = CountingFactory::default();
        // Active at 400x400 with scales 1.0 / 0.25.
        let mut pair = active_pair(Size::new(400, 400), &factory, true);

        // The next generation is tiny: minimum contents scale is
        // 1 / 8 = 0.125... below both? No: 1.0 stays, 0.25 stays. Make the
        // active high-res itself fall below the minimum by growing the
        // minimum: an 8x8 layer has minimum scale 0.125, so only sub-0.125
        // scales drop.
        let mut small = LayerTilings::new(
            LayerProperties {
                bounds: Size::new(4, 4),
                ..properties(Size::new(4, 4))
            },
            WhichTree::Pending,
            config(),
        );
        // Minimum scale for a 4x4 layer is 0.25: the active 0.25 low-res
        // survives, a hypothetical smaller high-res would be replaced.
        sync_pending_from_active(&mut small, pair.active().unwrap()).unwrap();
        let set = small.tilings().unwrap();
        assert!(set.tiling_at_scale(1.0).is_some());
        assert!(set.tiling_at_scale(0.25).is_some());
        assert!(set.high_res_tiling().is_some());
    }

    #[test]
    fn test_sync_creates_replacement_high_res_at_minimum_scale() {
        let factory = CountingFactory::default();
        // Active layer rasterized far below the pending minimum: a 100x100
        // layer at scale 0.05 (minimum for 100px is 0.0625... use a layer
        // whose minimum is higher).
        let mut pair = LayerPair::new(properties(Size::new(400, 400)), config());
        pair.create_pending().unwrap();
        {
            let pending = pair.pending_mut().unwrap();
            let inputs = ScaleInputs {
                page_scale: 0.0625,
                ..ScaleInputs::default()
            };
            pending.update_tilings(&inputs).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(Size::new(400, 400))),
                &factory,
                None,
            );
        }
        pair.activate();

        // Pending is a 10x10 layer: minimum scale 0.1, above the active
        // high-res scale of 0.0625. A replacement high-res at the minimum
        // scale is created.
        let mut tiny = LayerTilings::new(properties(Size::new(10, 10)), WhichTree::Pending, config());
        sync_pending_from_active(&mut tiny, pair.active().unwrap()).unwrap();

        let set = tiny.tilings().unwrap();
        let high = set.high_res_tiling().expect("high-res tiling exists");
        assert!(scales_equal(high.contents_scale(), 0.1));
    }

    #[test]
    fn test_readiness_all_required_when_active_cannot_have_tilings() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);

        let mut pair = LayerPair::new(properties(bounds), config());
        pair.create_pending().unwrap();
        let pending = pair.pending_mut().unwrap();
        pending.update_tilings(&ScaleInputs::default()).unwrap();
        pending.update_tile_priorities(&priority_inputs(Rect::from_size(bounds)), &factory, None);

        pair.mark_required_for_activation(false);

        let pending = pair.pending().unwrap();
        // All 16 visible high-res tiles are required, zero low-res.
        assert_eq!(required_high_res_count(pending), 16);
        assert_eq!(required_low_res_count(pending), 0);
        assert!(!pair.is_ready_to_activate());
    }

    #[test]
    fn test_readiness_all_required_when_geometry_differs() {
        let factory = CountingFactory::default();
        // Active twin is 400x400 and fully ready.
        let mut pair = active_pair(Size::new(400, 400), &factory, true);

        // Pending shrinks to 200x200 with fixed 100x100 tiles: geometry
        // differs, so ALL visible pending high-res tiles are required and
        // zero low-res tiles.
        pair.set_properties(properties(Size::new(200, 200)));
        pair.create_pending().unwrap();
        {
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(Size::new(200, 200))),
                &factory,
                None,
            );
        }
        pair.mark_required_for_activation(false);

        let pending = pair.pending().unwrap();
        assert_eq!(required_high_res_count(pending), 4);
        assert_eq!(required_low_res_count(pending), 0);
    }

    #[test]
    fn test_readiness_zero_required_when_fully_shared_and_ready() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);
        let mut pair = active_pair(bounds, &factory, true);

        // Same geometry, empty invalidation: every pending tile shares the
        // ready active tile.
        pair.create_pending().unwrap();
        {
            let active = pair.active.take();
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(bounds)),
                &factory,
                active.as_ref(),
            );
            pair.active = active;
        }
        pair.mark_required_for_activation(false);

        let pending = pair.pending().unwrap();
        assert_eq!(required_high_res_count(pending), 0);
        assert!(pair.is_ready_to_activate());
    }

    #[test]
    fn test_readiness_invalidated_tiles_required() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);
        let mut pair = active_pair(bounds, &factory, true);

        pair.create_pending().unwrap();
        pair.invalidate_pending(Rect::new(0, 0, 100, 100));
        {
            let active = pair.active.take();
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(bounds)),
                &factory,
                active.as_ref(),
            );
            pair.active = active;
        }
        pair.mark_required_for_activation(false);

        // The invalidated cell is fresh and unshared, but its active twin
        // is ready to draw, so activation would not regress: not required.
        let pending = pair.pending().unwrap();
        assert_eq!(required_high_res_count(pending), 0);
        assert!(pair.is_ready_to_activate());
    }

    #[test]
    fn test_readiness_unshared_with_unready_twin_required() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);
        // Active exists with tiles but nothing rasterized.
        let mut pair = active_pair(bounds, &factory, false);

        pair.create_pending().unwrap();
        pair.invalidate_pending(Rect::new(0, 0, 100, 100));
        {
            let active = pair.active.take();
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(bounds)),
                &factory,
                active.as_ref(),
            );
            pair.active = active;
        }
        pair.mark_required_for_activation(false);

        // The invalidated cell is unshared and its twin is not ready:
        // required. Shared cells are exempt even though unready.
        let pending = pair.pending().unwrap();
        assert_eq!(required_high_res_count(pending), 1);
    }

    #[test]
    fn test_readiness_occluded_tiles_exempt() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);

        let mut pair = LayerPair::new(properties(bounds), config());
        pair.create_pending().unwrap();
        {
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            let occlusion = terrazzo_tiles::Occlusion::new(
                terrazzo_geometry::Region::from_rect(Rect::new(0, 0, 100, 100)),
            );
            let inputs = PriorityInputs {
                occlusion: Some(&occlusion),
                ..priority_inputs(Rect::from_size(bounds))
            };
            pending.update_tile_priorities(&inputs, &factory, None);
        }
        pair.mark_required_for_activation(false);

        // One of the 16 visible tiles is fully occluded for the pending
        // tree and therefore exempt.
        let pending = pair.pending().unwrap();
        assert_eq!(required_high_res_count(pending), 15);
    }

    #[test]
    fn test_activation_swaps_priorities_and_destroys_exclusive_tiles() {
        let factory = CountingFactory::default();
        let bounds = Size::new(400, 400);
        let mut pair = active_pair(bounds, &factory, true);

        let old_active_tile = pair
            .active()
            .unwrap()
            .high_res_tiling()
            .unwrap()
            .tile_at(0, 0)
            .map(Rc::clone)
            .unwrap();

        // Pending invalidates one cell (fresh tile there) and shares the
        // rest.
        pair.create_pending().unwrap();
        pair.invalidate_pending(Rect::new(0, 0, 100, 100));
        {
            let active = pair.active.take();
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(bounds)),
                &factory,
                active.as_ref(),
            );
            pair.active = active;
        }

        let shared_tile = pair
            .pending()
            .unwrap()
            .high_res_tiling()
            .unwrap()
            .tile_at(1, 0)
            .map(Rc::clone)
            .unwrap();
        assert!(shared_tile.is_shared());
        let pending_priority = shared_tile.priority(WhichTree::Pending);
        assert_eq!(pending_priority.bin, PriorityBin::Now);

        pair.activate();

        // The layer pair now has an active generation only.
        assert!(pair.pending().is_none());
        let active = pair.active().unwrap();
        assert_eq!(active.tree(), WhichTree::Active);

        // Shared tiles adopted their pending priority as the new active
        // priority and are no longer marked shared.
        assert_eq!(shared_tile.priority(WhichTree::Active).bin, PriorityBin::Now);
        assert!(!shared_tile.is_shared());

        // The invalidated cell's old tile was exclusively owned by the
        // discarded generation and has been destroyed.
        assert_eq!(Rc::strong_count(&old_active_tile), 1);
        let replacement = active.high_res_tiling().unwrap().tile_at(0, 0).unwrap();
        assert!(!Rc::ptr_eq(replacement, &old_active_tile));
    }

    #[test]
    fn test_is_ready_to_activate_tracks_required_tiles() {
        let factory = CountingFactory::default();
        let bounds = Size::new(200, 200);

        let mut pair = LayerPair::new(properties(bounds), config());
        pair.create_pending().unwrap();
        {
            let pending = pair.pending_mut().unwrap();
            pending.update_tilings(&ScaleInputs::default()).unwrap();
            pending.update_tile_priorities(
                &priority_inputs(Rect::from_size(bounds)),
                &factory,
                None,
            );
        }
        pair.mark_required_for_activation(false);
        assert!(!pair.is_ready_to_activate());

        mark_all_ready(pair.pending().unwrap());
        assert!(pair.is_ready_to_activate());
    }
}
