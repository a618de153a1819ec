//! Tiling policy configuration.
//!
//! Every numeric policy threshold of the scale-selection and prioritization
//! heuristics lives here rather than being hard-coded, so embedders can tune
//! them per platform.

use serde::{Deserialize, Serialize};

use terrazzo_geometry::Size;

/// Tunable policy constants for tiling and scale selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    /// Tile size for layers large enough to be tiled.
    pub default_tile_size: Size,
    /// Layers whose scaled content fits within this size get a single tile
    /// covering the whole layer instead of a grid.
    pub max_untiled_size: Size,
    /// Absolute floor for contents scales.
    pub minimum_contents_scale: f32,
    /// Low-resolution tilings are created at the raster scale times this.
    pub low_res_factor: f32,
    /// Steady-state tolerance window: the high-resolution tiling is kept
    /// while `|ideal / raster - 1|` stays within this fraction.
    pub scale_tolerance: f32,
    /// During a pinch, a new tiling is only introduced once the ideal scale
    /// drifts beyond this ratio from the raster scale; steps toward the
    /// ideal move by this factor.
    pub max_pinch_ratio: f32,
    /// During a pinch, an existing tiling within this ratio of the desired
    /// scale is adopted instead of creating a new one.
    pub pinch_snap_ratio: f32,
    /// Screen-pixel distance within which tiles are promoted to SOON.
    pub soon_border_px: f32,
    /// Screen-pixel distance out to which tiles are kept alive as
    /// EVENTUALLY.
    pub interest_border_px: f32,
    /// Cap on raster tasks dispatched per scheduling pass.
    pub max_raster_tasks_per_pass: usize,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            default_tile_size: Size::new(256, 256),
            max_untiled_size: Size::new(512, 512),
            minimum_contents_scale: 0.0625,
            low_res_factor: 0.25,
            scale_tolerance: 0.05,
            max_pinch_ratio: 2.0,
            pinch_snap_ratio: 1.2,
            soon_border_px: 312.0,
            interest_border_px: 1024.0,
            max_raster_tasks_per_pass: 32,
        }
    }
}

impl TilingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile_size(mut self, tile_size: Size) -> Self {
        self.default_tile_size = tile_size;
        self
    }

    pub fn with_max_untiled_size(mut self, size: Size) -> Self {
        self.max_untiled_size = size;
        self
    }

    pub fn with_low_res_factor(mut self, factor: f32) -> Self {
        self.low_res_factor = factor.clamp(0.01, 1.0);
        self
    }

    pub fn with_scale_tolerance(mut self, tolerance: f32) -> Self {
        self.scale_tolerance = tolerance.max(0.0);
        self
    }

    pub fn with_max_pinch_ratio(mut self, ratio: f32) -> Self {
        self.max_pinch_ratio = ratio.max(1.0);
        self
    }

    pub fn with_pinch_snap_ratio(mut self, ratio: f32) -> Self {
        self.pinch_snap_ratio = ratio.max(1.0);
        self
    }

    pub fn with_soon_border_px(mut self, px: f32) -> Self {
        self.soon_border_px = px.max(0.0);
        self
    }

    pub fn with_interest_border_px(mut self, px: f32) -> Self {
        self.interest_border_px = px.max(0.0);
        self
    }

    /// The tile size to use for a layer with the given scaled content
    /// bounds: small layers get one tile covering everything (rounded up so
    /// minor resizes do not churn the tile size), large layers the default.
    pub fn tile_size_for(&self, content_bounds: Size) -> Size {
        if content_bounds.width <= self.max_untiled_size.width
            && content_bounds.height <= self.max_untiled_size.height
        {
            Size::new(
                round_up_to(content_bounds.width.max(1), 64),
                round_up_to(content_bounds.height.max(1), 64),
            )
        } else {
            self.default_tile_size
        }
    }
}

fn round_up_to(value: i32, multiple: i32) -> i32 {
    ((value + multiple - 1) / multiple) * multiple
}

/// Numeric-epsilon scale comparison.
///
/// Deliberately tight: distinct zoom and animation paths that independently
/// compute "the same" scale must neither spuriously collide nor diverge, so
/// a loose tolerance is wrong here.
pub fn scales_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= f32::EPSILON * a.abs().max(b.abs()).max(1.0) * 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TilingConfig::default();
        assert_eq!(config.default_tile_size, Size::new(256, 256));
        assert!(config.low_res_factor < 1.0);
        assert!(config.max_pinch_ratio >= 2.0);
    }

    #[test]
    fn test_builders_clamp() {
        let config = TilingConfig::new()
            .with_low_res_factor(5.0)
            .with_max_pinch_ratio(0.5)
            .with_scale_tolerance(-1.0);
        assert_eq!(config.low_res_factor, 1.0);
        assert_eq!(config.max_pinch_ratio, 1.0);
        assert_eq!(config.scale_tolerance, 0.0);
    }

    #[test]
    fn test_tile_size_for_small_layer_is_untiled() {
        let config = TilingConfig::default();
        let size = config.tile_size_for(Size::new(300, 200));
        assert_eq!(size, Size::new(320, 256));
    }

    #[test]
    fn test_tile_size_for_large_layer_is_default() {
        let config = TilingConfig::default();
        assert_eq!(
            config.tile_size_for(Size::new(2000, 300)),
            Size::new(256, 256)
        );
    }

    #[test]
    fn test_scales_equal_is_tight() {
        assert!(scales_equal(1.3, 1.3));
        assert!(scales_equal(0.1 + 0.2, 0.3));
        assert!(!scales_equal(1.3, 1.3001));
        assert!(!scales_equal(2.0, 2.0 * 1.001));
    }
}
