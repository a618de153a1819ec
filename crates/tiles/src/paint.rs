//! Paint source collaborator interface.
//!
//! The engine never produces pixels itself. A paint source turns a region at
//! a contents scale into pixels inside a raster worker task, and answers
//! cheap content queries (solid color, text presence) used for raster-mode
//! selection and placeholder short-circuiting.

use terrazzo_geometry::{Rect, Size};

/// An RGBA color, used for solid-color tile versions and placeholder quads.
pub type Color = [u8; 4];

/// Result of analyzing a content region prior to rasterization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionAnalysis {
    /// Set when the region is a single solid color and needs no resource.
    pub solid_color: Option<Color>,
    /// True when the region contains text, which pins rasterization to the
    /// high-quality mode for legibility.
    pub has_text: bool,
}

/// A CPU-side pixel target filled by [`PaintSource::raster`].
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    size: Size,
    pixels: Vec<u8>,
}

impl RasterCanvas {
    /// Allocate an RGBA canvas of the given size.
    pub fn new(size: Size) -> Self {
        let bytes = (size.area().max(0) as usize) * 4;
        Self {
            size,
            pixels: vec![0; bytes],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Size of the backing pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Produces pixels for tile content.
///
/// `raster` is only ever invoked from inside a worker task; `can_raster` and
/// `analyze` are called on the scheduling thread and must be cheap.
pub trait PaintSource: Send + Sync {
    /// True if the source has recorded content covering `content_rect` at
    /// `contents_scale`. Tiles are only created for rasterable regions.
    fn can_raster(&self, contents_scale: f32, content_rect: Rect) -> bool;

    /// Analyze a content region for solid color and text.
    fn analyze(&self, content_rect: Rect, contents_scale: f32) -> RegionAnalysis;

    /// Rasterize `content_rect` at `contents_scale` into `canvas`.
    fn raster(&self, canvas: &mut RasterCanvas, content_rect: Rect, contents_scale: f32);
}
