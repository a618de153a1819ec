//! Cancellation tokens for raster tasks.
//!
//! A token is shared between the scheduling thread and the worker executing
//! the task. Workers check the token cooperatively: a task cancelled before
//! it starts runs to a no-op, and a task cancelled mid-flight simply has its
//! late result discarded by the tile manager.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use terrazzo_tiles::RasterTaskId;

/// Cooperative cancellation flag for one raster task.
///
/// All clones observe a cancellation; cancelling is idempotent.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and all of its clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once `cancel()` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Tracks the tokens of in-flight raster tasks by task id.
#[derive(Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<RasterTaskId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task and return its token.
    pub fn register(&self, task_id: RasterTaskId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .unwrap()
            .insert(task_id, token.clone());
        token
    }

    /// Cancel a task's token. Returns whether the task was registered.
    pub fn cancel(&self, task_id: RasterTaskId) -> bool {
        match self.tokens.lock().unwrap().get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered task. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let tokens = self.tokens.lock().unwrap();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    /// Drop a task's token (on completion or stale cleanup).
    pub fn unregister(&self, task_id: RasterTaskId) -> bool {
        self.tokens.lock().unwrap().remove(&task_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_basic() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        // Idempotent.
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_registry_register_and_cancel() {
        let registry = CancellationRegistry::new();
        let token = registry.register(RasterTaskId(1));

        assert!(!token.is_cancelled());
        assert!(registry.cancel(RasterTaskId(1)));
        assert!(token.is_cancelled());

        assert!(!registry.cancel(RasterTaskId(99)));
    }

    #[test]
    fn test_registry_unregister() {
        let registry = CancellationRegistry::new();
        registry.register(RasterTaskId(1));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(RasterTaskId(1)));
        assert!(registry.is_empty());
        assert!(!registry.unregister(RasterTaskId(1)));
    }

    #[test]
    fn test_registry_cancel_all() {
        let registry = CancellationRegistry::new();
        let a = registry.register(RasterTaskId(1));
        let b = registry.register(RasterTaskId(2));
        assert_eq!(registry.cancel_all(), 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
