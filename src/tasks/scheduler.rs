//! Scheduler
//!
//! Owns the two background timers of one cache instance.

use tokio::task::JoinHandle;

use crate::cache::AdvancedCache;
use crate::tasks::{spawn_cleanup_task, spawn_persistence_task};

#[derive(Debug)]
pub struct Scheduler {
    cleanup: JoinHandle<()>,
    persistence: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts the cleanup timer, and the persistence timer when enabled.
    pub fn start(cache: &AdvancedCache) -> Self {
        let config = cache.config();
        let cleanup = spawn_cleanup_task(cache.downgrade(), config.cleanup_interval());
        let persistence = config
            .persistence_enabled
            .then(|| spawn_persistence_task(cache.downgrade(), config.persistence_interval()));

        Self {
            cleanup,
            persistence,
        }
    }

    pub fn has_persistence(&self) -> bool {
        self.persistence.is_some()
    }

    /// Aborts both timers. Consumes the scheduler so it can only run once.
    pub fn stop(self) {
        self.cleanup.abort();
        if let Some(handle) = self.persistence {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[tokio::test]
    async fn test_persistence_timer_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let enabled = AdvancedCache::new(CacheConfig {
            persistence_path: dir.path().to_path_buf(),
            ..CacheConfig::default()
        });
        let disabled = AdvancedCache::new(CacheConfig {
            persistence_enabled: false,
            ..CacheConfig::default()
        });

        let with_timer = Scheduler::start(&enabled);
        let without_timer = Scheduler::start(&disabled);
        assert!(with_timer.has_persistence());
        assert!(!without_timer.has_persistence());

        with_timer.stop();
        without_timer.stop();
        enabled.close().await;
        disabled.close().await;
    }
}
