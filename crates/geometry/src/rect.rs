//! Points, sizes and axis-aligned integer rectangles.

use serde::{Deserialize, Serialize};

use crate::{safe_ceil, safe_floor};

/// An integer point in content or layer space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An integer size. Dimensions are clamped to be non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    /// Create a new size, clamping negative dimensions to zero.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// True if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Area in pixels, widened to avoid overflow.
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Scale both dimensions and round up to the enclosing integer size.
    ///
    /// Non-finite or negative scales clamp to an empty size.
    pub fn scale_ceil(&self, scale: f32) -> Size {
        if !scale.is_finite() || scale <= 0.0 {
            return Size::default();
        }
        Size::new(
            safe_ceil(self.width as f32 * scale),
            safe_ceil(self.height as f32 * scale),
        )
    }
}

/// An axis-aligned integer rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    /// Create a rect from origin coordinates and dimensions.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Create a rect at the origin covering `size`.
    pub fn from_size(size: Size) -> Self {
        Self {
            origin: Point::default(),
            size,
        }
    }

    pub fn x(&self) -> i32 {
        self.origin.x
    }

    pub fn y(&self) -> i32 {
        self.origin.y
    }

    pub fn width(&self) -> i32 {
        self.size.width
    }

    pub fn height(&self) -> i32 {
        self.size.height
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.origin.x.saturating_add(self.size.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.origin.y.saturating_add(self.size.height)
    }

    /// True if the rect covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// Area in pixels.
    pub fn area(&self) -> i64 {
        self.size.area()
    }

    /// True if `self` and `other` share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x() < other.right()
            && other.x() < self.right()
            && self.y() < other.bottom()
            && other.y() < self.bottom()
    }

    /// The intersection of two rects, empty if they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x().max(other.x());
        let y = self.y().max(other.y());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return Rect::default();
        }
        Rect::new(x, y, right - x, bottom - y)
    }

    /// The smallest rect containing both rects.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x().min(other.x());
        let y = self.y().min(other.y());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// True if `other` lies entirely within `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (self.x() <= other.x()
                && self.y() <= other.y()
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    /// True if the point lies within the rect.
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x() && point.x < self.right() && point.y >= self.y() && point.y < self.bottom()
    }

    /// Shrink (positive amounts) or grow (negative amounts) each edge.
    pub fn inset(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        let x = self.x().saturating_add(left);
        let y = self.y().saturating_add(top);
        let width = self.width().saturating_sub(left).saturating_sub(right);
        let height = self.height().saturating_sub(top).saturating_sub(bottom);
        Rect::new(x, y, width, height)
    }

    /// Grow every edge outward by `amount`.
    pub fn expand(&self, amount: i32) -> Rect {
        self.inset(-amount, -amount, -amount, -amount)
    }

    /// The Manhattan distance between the interiors of two rects.
    ///
    /// Zero when the rects intersect or touch. Matches the metric used for
    /// distance-to-visible prioritization: the union's excess extent over the
    /// two rects in each axis.
    pub fn manhattan_internal_distance(&self, other: &Rect) -> i64 {
        let union = self.union(other);
        let dx = (union.width() as i64 - self.width() as i64 - other.width() as i64 + 1).max(0);
        let dy = (union.height() as i64 - self.height() as i64 - other.height() as i64 + 1).max(0);
        dx + dy
    }

    /// Scale a rect and round outward to the smallest enclosing integer rect.
    ///
    /// Non-finite or non-positive scales produce an empty rect.
    pub fn scale_to_enclosing(&self, scale: f32) -> Rect {
        if !scale.is_finite() || scale <= 0.0 {
            return Rect::default();
        }
        let x = safe_floor(self.x() as f32 * scale);
        let y = safe_floor(self.y() as f32 * scale);
        let right = safe_ceil(self.right() as f32 * scale);
        let bottom = safe_ceil(self.bottom() as f32 * scale);
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Scale a rect and round inward to the largest enclosed integer rect.
    pub fn scale_to_enclosed(&self, scale: f32) -> Rect {
        if !scale.is_finite() || scale <= 0.0 {
            return Rect::default();
        }
        let x = safe_ceil(self.x() as f32 * scale);
        let y = safe_ceil(self.y() as f32 * scale);
        let right = safe_floor(self.right() as f32 * scale);
        let bottom = safe_floor(self.bottom() as f32 * scale);
        Rect::new(x, y, right - x, bottom - y)
    }
}
