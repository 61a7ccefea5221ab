//! Configuration module
//!
//! Loading, normalization and the hot-swappable handle every component reads
//! the current configuration through.

pub mod loader;
pub mod schema;

use std::sync::{Arc, PoisonError, RwLock};

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;

/// Shared, replaceable view of the active configuration.
///
/// Readers take a cheap `Arc` snapshot; a reload swaps the pointer so an
/// in-flight tick keeps the snapshot it started with.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<EngineConfig>>>,
}

impl ConfigHandle {
    /// Wraps an initial configuration.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Installs `config` and returns the previous snapshot.
    pub fn replace(&self, config: Arc<EngineConfig>) -> Arc<EngineConfig> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, config)
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Arc::new(EngineConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_returns_previous_snapshot() {
        let handle = ConfigHandle::default();
        let before = handle.current();
        let mut next = EngineConfig::default();
        next.scheduler.interval_ticks = 7;
        let old = handle.replace(Arc::new(next));
        assert_eq!(old.scheduler.interval_ticks, 100);
        assert_eq!(before.scheduler.interval_ticks, 100);
        assert_eq!(handle.current().scheduler.interval_ticks, 7);
    }
}
