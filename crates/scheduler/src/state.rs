//! Global scheduling state for one pass.

use serde::{Deserialize, Serialize};

use terrazzo_cache::MemoryPolicy;
use terrazzo_tiles::TreePriority;

/// Immutable snapshot of the global inputs to a scheduling pass.
///
/// Built once per pass from the frame scheduler's tree-priority mode and the
/// current memory policy, then consumed read-only — never mutated mid-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPriorityState {
    /// Which tree's priorities dominate queue ordering.
    pub tree_priority: TreePriority,
    /// Eviction target: the pass evicts while allocation exceeds this.
    pub soft_memory_limit_bytes: usize,
    /// Absolute ceiling enforced by the resource pool.
    pub hard_memory_limit_bytes: usize,
    /// Maximum number of live resources.
    pub max_resource_count: usize,
    /// Cap on raster tasks dispatched in one pass.
    pub max_raster_tasks: usize,
}

impl Default for GlobalPriorityState {
    fn default() -> Self {
        Self::new(TreePriority::default(), &MemoryPolicy::default(), 32)
    }
}

impl GlobalPriorityState {
    /// Snapshot the given mode and memory policy.
    pub fn new(tree_priority: TreePriority, policy: &MemoryPolicy, max_raster_tasks: usize) -> Self {
        Self {
            tree_priority,
            soft_memory_limit_bytes: policy.soft_limit_bytes,
            hard_memory_limit_bytes: policy.hard_limit_bytes,
            max_resource_count: policy.max_resource_count,
            max_raster_tasks,
        }
    }

    /// A snapshot that allows nothing, used on resource loss.
    pub fn zero(tree_priority: TreePriority) -> Self {
        Self::new(tree_priority, &MemoryPolicy::zero(), 0)
    }
}
