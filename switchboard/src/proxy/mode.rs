//! Per-caller proxy mode context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-caller flag forcing synchronous delivery.
///
/// Construct one `ProxyMode` per logical caller (one test run, one request
/// chain) and pass it explicitly down every call path that may reach the
/// dispatcher. Clones share the underlying cell, so a scope controller and
/// the code under it observe the same flag — but two independent callers
/// holding their *own* `ProxyMode` instances can never interfere, which is
/// the point of making the context explicit rather than ambient.
///
/// Reads and writes are lock-free; a single flag needs no ordering beyond
/// the atomic access itself.
#[derive(Debug, Clone, Default)]
pub struct ProxyMode {
    force_sync: Arc<AtomicBool>,
}

impl ProxyMode {
    /// A context with forcing disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this caller's sends are forced synchronous.
    pub fn is_force_sync(&self) -> bool {
        self.force_sync.load(Ordering::Relaxed)
    }

    /// Set or clear forced-synchronous delivery for this caller.
    pub fn set_force_sync(&self, force_sync: bool) {
        self.force_sync.store(force_sync, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_unforced() {
        assert!(!ProxyMode::new().is_force_sync());
    }

    #[test]
    fn test_set_and_clear() {
        let mode = ProxyMode::new();
        mode.set_force_sync(true);
        assert!(mode.is_force_sync());
        mode.set_force_sync(false);
        assert!(!mode.is_force_sync());
    }

    #[test]
    fn test_clones_share_the_cell() {
        let mode = ProxyMode::new();
        let other = mode.clone();

        other.set_force_sync(true);
        assert!(mode.is_force_sync());
    }

    #[test]
    fn test_independent_contexts_do_not_interfere() {
        let a = ProxyMode::new();
        let b = ProxyMode::new();

        a.set_force_sync(true);
        assert!(!b.is_force_sync());
    }
}
