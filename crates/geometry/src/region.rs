//! Rectangle regions for invalidation and occlusion tracking.

use serde::{Deserialize, Serialize};

use crate::Rect;

/// A set of rectangles in layer space.
///
/// Used to accumulate invalidation damage between updates and to describe
/// opaque content for occlusion queries. The representation is a plain rect
/// list: overlapping rects are allowed and empty rects are discarded on
/// insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// Create an empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a region covering a single rect.
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union(rect);
        region
    }

    /// True if the region covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Add a rect to the region. Empty rects are ignored; rects already
    /// covered by an existing entry are dropped.
    pub fn union(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        if self.rects.iter().any(|existing| existing.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|existing| !rect.contains_rect(existing));
        self.rects.push(rect);
    }

    /// True if any rect in the region overlaps `rect`.
    pub fn intersects(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|existing| existing.intersects(rect))
    }

    /// True if a single rect in the region fully covers `rect`.
    ///
    /// This is the conservative containment test used for occlusion: content
    /// covered only by the union of several rects does not count as covered.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        !rect.is_empty() && self.rects.iter().any(|existing| existing.contains_rect(rect))
    }

    /// The bounding box of the region.
    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, rect| acc.union(rect))
    }

    /// Iterate over the rects of the region.
    pub fn iter(&self) -> impl Iterator<Item = &Rect> {
        self.rects.iter()
    }

    /// Remove all rects.
    pub fn clear(&mut self) {
        self.rects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_region() {
        let region = Region::new();
        assert!(region.is_empty());
        assert!(!region.intersects(&Rect::new(0, 0, 10, 10)));
        assert!(region.bounds().is_empty());
    }

    #[test]
    fn test_union_ignores_empty_and_covered() {
        let mut region = Region::from_rect(Rect::new(0, 0, 100, 100));
        region.union(Rect::default());
        region.union(Rect::new(10, 10, 20, 20));
        assert_eq!(region.iter().count(), 1);
    }

    #[test]
    fn test_union_drops_swallowed_rects() {
        let mut region = Region::from_rect(Rect::new(10, 10, 20, 20));
        region.union(Rect::new(0, 0, 100, 100));
        assert_eq!(region.iter().count(), 1);
        assert_eq!(region.bounds(), Rect::new(0, 0, 100, 100));
    }

    #[test]
    fn test_intersects() {
        let mut region = Region::new();
        region.union(Rect::new(0, 0, 50, 50));
        region.union(Rect::new(100, 100, 50, 50));

        assert!(region.intersects(&Rect::new(40, 40, 20, 20)));
        assert!(region.intersects(&Rect::new(120, 120, 5, 5)));
        assert!(!region.intersects(&Rect::new(60, 60, 30, 30)));
    }

    #[test]
    fn test_contains_rect_is_single_rect_conservative() {
        let mut region = Region::new();
        region.union(Rect::new(0, 0, 50, 100));
        region.union(Rect::new(50, 0, 50, 100));

        // Fully inside one rect.
        assert!(region.contains_rect(&Rect::new(10, 10, 20, 20)));
        // Covered only by the union of the two rects: conservatively not
        // contained.
        assert!(!region.contains_rect(&Rect::new(25, 25, 50, 50)));
    }

    #[test]
    fn test_bounds() {
        let mut region = Region::new();
        region.union(Rect::new(10, 10, 10, 10));
        region.union(Rect::new(50, 60, 10, 10));
        assert_eq!(region.bounds(), Rect::new(10, 10, 50, 60));
    }
}
