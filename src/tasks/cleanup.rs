//! Cleanup Task
//!
//! Background task that periodically sweeps expired entries and trims the
//! cache back to `max_items`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakCache;

/// Spawns the periodic sweep.
///
/// The task sleeps for `interval`, then upgrades its weak handle and runs
/// one sweep. It exits on its own once the cache has been dropped; `close()`
/// aborts it earlier.
pub fn spawn_cleanup_task(cache: WeakCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cleanup task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, cleanup task exiting");
                break;
            };

            let (expired, trimmed) = cache.run_cleanup().await;

            if expired > 0 || trimmed > 0 {
                info!(
                    "Cleanup: removed {} expired and {} over-limit entries",
                    expired, trimmed
                );
            } else {
                debug!("Cleanup: nothing to remove");
            }
        }
    })
}
