//! Memory policy: soft/hard limits and pressure levels.
//!
//! The policy is the tunable half of budget enforcement: the scheduler
//! evicts down to the soft limit before scheduling new raster work, while
//! the pool's hard limit is the absolute ceiling past which tiles degrade to
//! placeholder draws instead of failing.

use serde::{Deserialize, Serialize};

use crate::pool::ResourceLimits;

/// Memory pressure derived from utilization of the soft limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    /// Below half the soft limit.
    Low,
    /// Between 50% and 75%.
    Moderate,
    /// Between 75% and 90%; eviction should run.
    High,
    /// Above 90%; eviction must run before new raster work.
    Critical,
}

impl MemoryPressure {
    /// Derive the pressure level from a utilization ratio (0.0 to 1.0+).
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.5 {
            MemoryPressure::Low
        } else if utilization < 0.75 {
            MemoryPressure::Moderate
        } else if utilization < 0.90 {
            MemoryPressure::High
        } else {
            MemoryPressure::Critical
        }
    }

    /// True if this level calls for eviction.
    pub fn needs_eviction(&self) -> bool {
        matches!(self, MemoryPressure::High | MemoryPressure::Critical)
    }
}

/// Memory budget policy for a scheduling pass.
///
/// # Example
///
/// ```
/// use terrazzo_cache::MemoryPolicy;
///
/// let policy = MemoryPolicy::with_limit_mb(128).with_hard_limit_mb(192);
/// assert!(policy.soft_limit_bytes < policy.hard_limit_bytes);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPolicy {
    /// Target byte level: eviction runs while allocation exceeds this.
    pub soft_limit_bytes: usize,
    /// Absolute byte ceiling enforced by the pool.
    pub hard_limit_bytes: usize,
    /// Maximum number of live resources.
    pub max_resource_count: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            soft_limit_bytes: 128 * 1024 * 1024,
            hard_limit_bytes: 192 * 1024 * 1024,
            max_resource_count: 4096,
        }
    }
}

impl MemoryPolicy {
    /// Create a policy with a soft limit in megabytes; the hard limit is set
    /// to 1.5x the soft limit.
    pub fn with_limit_mb(soft_mb: usize) -> Self {
        Self {
            soft_limit_bytes: soft_mb * 1024 * 1024,
            hard_limit_bytes: soft_mb * 3 / 2 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Set the hard limit in megabytes.
    pub fn with_hard_limit_mb(mut self, hard_mb: usize) -> Self {
        self.hard_limit_bytes = hard_mb * 1024 * 1024;
        self
    }

    /// Set the resource-count ceiling.
    pub fn with_max_resources(mut self, count: usize) -> Self {
        self.max_resource_count = count;
        self
    }

    /// A policy that refuses all allocation, used on resource loss.
    pub fn zero() -> Self {
        Self {
            soft_limit_bytes: 0,
            hard_limit_bytes: 0,
            max_resource_count: 0,
        }
    }

    /// The pool ceilings implied by this policy.
    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            max_bytes: self.hard_limit_bytes,
            max_resources: self.max_resource_count,
        }
    }

    /// Pressure at a given allocation level, relative to the soft limit.
    pub fn pressure(&self, bytes_allocated: usize) -> MemoryPressure {
        let utilization = if self.soft_limit_bytes == 0 {
            if bytes_allocated == 0 {
                0.0
            } else {
                1.0
            }
        } else {
            bytes_allocated as f64 / self.soft_limit_bytes as f64
        };
        MemoryPressure::from_utilization(utilization)
    }
}
