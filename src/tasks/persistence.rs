//! Persistence Task
//!
//! Background task that periodically writes the `cache.json` snapshot.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakCache;

/// Spawns the periodic snapshot writer.
///
/// Write failures are already counted and published by `save_to_disk`, so
/// the loop simply carries on to the next tick.
pub fn spawn_persistence_task(cache: WeakCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting persistence task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, persistence task exiting");
                break;
            };

            if let Ok(path) = cache.save_to_disk().await {
                debug!("Snapshot saved to {}", path.display());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::cache::persistence::SNAPSHOT_FILE;
    use crate::cache::{AdvancedCache, SetOptions};
    use crate::config::CacheConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_periodic_snapshot_written() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AdvancedCache::new(CacheConfig {
            persistence_path: dir.path().to_path_buf(),
            persistence_interval_ms: 100,
            ..CacheConfig::default()
        });
        cache.set("k", "v", SetOptions::new()).await;

        tokio::time::sleep(Duration::from_millis(400)).await;

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(SNAPSHOT_FILE)).unwrap())
                .unwrap();
        assert_eq!(raw["items"][0][0], "k");
        assert!(raw.get("config").is_none(), "periodic save omits config");
        cache.close().await;
    }

    #[tokio::test]
    async fn test_no_snapshot_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AdvancedCache::new(CacheConfig {
            persistence_enabled: false,
            persistence_path: dir.path().to_path_buf(),
            persistence_interval_ms: 50,
            ..CacheConfig::default()
        });
        cache.set("k", "v", SetOptions::new()).await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        cache.close().await;

        assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    }
}
