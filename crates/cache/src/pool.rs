//! Resource pool: acquire/release of tile backing stores by size.
//!
//! The pool models the external allocator that backs rasterized tiles. It
//! tracks live allocations and enforces hard byte and count ceilings:
//! acquisition above a ceiling is refused, never queued — the scheduler
//! reacts by evicting or degrading to placeholder draws.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of a live pool resource.
pub type ResourceId = u64;

/// Bytes per pixel of a tile backing store (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// Hard ceilings enforced by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum total bytes of live resources.
    pub max_bytes: usize,
    /// Maximum number of live resources.
    pub max_resources: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_bytes: 192 * 1024 * 1024,
            max_resources: 4096,
        }
    }
}

impl ResourceLimits {
    /// Create limits from a megabyte budget and a resource count.
    pub fn new(max_mb: usize, max_resources: usize) -> Self {
        Self {
            max_bytes: max_mb * 1024 * 1024,
            max_resources,
        }
    }

    /// Set the byte ceiling in megabytes.
    pub fn with_max_mb(mut self, mb: usize) -> Self {
        self.max_bytes = mb * 1024 * 1024;
        self
    }

    /// Set the resource-count ceiling.
    pub fn with_max_resources(mut self, count: usize) -> Self {
        self.max_resources = count;
        self
    }
}

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourcePoolStats {
    /// Bytes currently allocated.
    pub bytes_allocated: usize,
    /// Number of live resources.
    pub resource_count: usize,
    /// High-water mark of allocated bytes.
    pub peak_bytes: usize,
    /// Successful acquisitions over the pool's lifetime.
    pub acquisitions: u64,
    /// Releases over the pool's lifetime.
    pub releases: u64,
    /// Acquisitions refused because a ceiling would be exceeded.
    pub denied: u64,
}

impl ResourcePoolStats {
    /// Utilization of the byte ceiling (0.0 to 1.0+).
    pub fn utilization(&self, limits: &ResourceLimits) -> f64 {
        if limits.max_bytes == 0 {
            0.0
        } else {
            self.bytes_allocated as f64 / limits.max_bytes as f64
        }
    }
}

/// Tracks live tile backing stores against hard ceilings.
///
/// # Example
///
/// ```
/// use terrazzo_cache::{ResourceLimits, ResourcePool};
///
/// let mut pool = ResourcePool::new(ResourceLimits::new(64, 256));
/// let id = pool.acquire(256 * 256 * 4).expect("fits the budget");
/// assert_eq!(pool.bytes_allocated(), 256 * 256 * 4);
/// pool.release(id);
/// assert_eq!(pool.bytes_allocated(), 0);
/// ```
#[derive(Debug)]
pub struct ResourcePool {
    limits: ResourceLimits,
    next_id: ResourceId,
    allocations: HashMap<ResourceId, usize>,
    stats: ResourcePoolStats,
}

impl ResourcePool {
    /// Create a pool with the given ceilings.
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            next_id: 1,
            allocations: HashMap::new(),
            stats: ResourcePoolStats::default(),
        }
    }

    /// Acquire a resource of `bytes`, or `None` if a ceiling would be
    /// exceeded.
    pub fn acquire(&mut self, bytes: usize) -> Option<ResourceId> {
        let new_total = self.stats.bytes_allocated.saturating_add(bytes);
        if new_total > self.limits.max_bytes
            || self.allocations.len() + 1 > self.limits.max_resources
        {
            self.stats.denied += 1;
            log::debug!(
                "resource pool refused {} bytes ({} allocated of {} max)",
                bytes,
                self.stats.bytes_allocated,
                self.limits.max_bytes
            );
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.allocations.insert(id, bytes);
        self.stats.bytes_allocated = new_total;
        self.stats.peak_bytes = self.stats.peak_bytes.max(new_total);
        self.stats.resource_count = self.allocations.len();
        self.stats.acquisitions += 1;
        Some(id)
    }

    /// Release a resource. Unknown ids are ignored (stale completions may
    /// race with eviction); returns whether the id was live.
    pub fn release(&mut self, id: ResourceId) -> bool {
        match self.allocations.remove(&id) {
            Some(bytes) => {
                self.stats.bytes_allocated = self.stats.bytes_allocated.saturating_sub(bytes);
                self.stats.resource_count = self.allocations.len();
                self.stats.releases += 1;
                true
            }
            None => false,
        }
    }

    /// Replace the ceilings. Existing allocations are unaffected; a pool
    /// over the new ceiling simply refuses further acquisitions until
    /// eviction catches up.
    pub fn set_limits(&mut self, limits: ResourceLimits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    pub fn bytes_allocated(&self) -> usize {
        self.stats.bytes_allocated
    }

    pub fn resource_count(&self) -> usize {
        self.allocations.len()
    }

    /// True if the given byte level exceeds current allocation.
    pub fn is_over(&self, byte_limit: usize) -> bool {
        self.stats.bytes_allocated > byte_limit
    }

    /// True if one more resource of `bytes` would exceed a ceiling.
    pub fn would_exceed(&self, bytes: usize) -> bool {
        self.stats.bytes_allocated.saturating_add(bytes) > self.limits.max_bytes
            || self.allocations.len() + 1 > self.limits.max_resources
    }

    pub fn stats(&self) -> ResourcePoolStats {
        self.stats
    }
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new(ResourceLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let mut pool = ResourcePool::new(ResourceLimits::new(1, 10));
        let id = pool.acquire(1000).unwrap();
        assert_eq!(pool.bytes_allocated(), 1000);
        assert_eq!(pool.resource_count(), 1);

        assert!(pool.release(id));
        assert_eq!(pool.bytes_allocated(), 0);
        assert_eq!(pool.resource_count(), 0);
    }

    #[test]
    fn test_byte_ceiling_refuses() {
        let mut pool = ResourcePool::new(ResourceLimits {
            max_bytes: 1000,
            max_resources: 10,
        });
        assert!(pool.acquire(600).is_some());
        assert!(pool.acquire(600).is_none());
        assert_eq!(pool.stats().denied, 1);
        // A smaller request still fits.
        assert!(pool.acquire(400).is_some());
    }

    #[test]
    fn test_count_ceiling_refuses() {
        let mut pool = ResourcePool::new(ResourceLimits {
            max_bytes: usize::MAX,
            max_resources: 2,
        });
        assert!(pool.acquire(1).is_some());
        assert!(pool.acquire(1).is_some());
        assert!(pool.acquire(1).is_none());
    }

    #[test]
    fn test_release_unknown_id_is_ignored() {
        let mut pool = ResourcePool::default();
        assert!(!pool.release(999));
        assert_eq!(pool.stats().releases, 0);
    }

    #[test]
    fn test_peak_tracking() {
        let mut pool = ResourcePool::new(ResourceLimits::new(1, 10));
        let a = pool.acquire(500).unwrap();
        let _b = pool.acquire(300).unwrap();
        pool.release(a);
        assert_eq!(pool.bytes_allocated(), 300);
        assert_eq!(pool.stats().peak_bytes, 800);
    }

    #[test]
    fn test_lowering_limits_does_not_free() {
        let mut pool = ResourcePool::new(ResourceLimits::new(1, 10));
        pool.acquire(800_000).unwrap();

        pool.set_limits(ResourceLimits {
            max_bytes: 100_000,
            max_resources: 10,
        });
        assert_eq!(pool.bytes_allocated(), 800_000);
        assert!(pool.is_over(pool.limits().max_bytes));
        assert!(pool.acquire(1).is_none());
    }

    #[test]
    fn test_would_exceed() {
        let mut pool = ResourcePool::new(ResourceLimits {
            max_bytes: 1000,
            max_resources: 10,
        });
        pool.acquire(900).unwrap();
        assert!(pool.would_exceed(200));
        assert!(!pool.would_exceed(100));
    }

    #[test]
    fn test_utilization() {
        let mut pool = ResourcePool::new(ResourceLimits {
            max_bytes: 1000,
            max_resources: 10,
        });
        pool.acquire(250).unwrap();
        let utilization = pool.stats().utilization(&pool.limits());
        assert!((utilization - 0.25).abs() < 1e-9);
    }
}
