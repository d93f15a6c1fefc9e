//! Persistence Manager
//!
//! JSON snapshots of the store. Writes go to a temp file that is renamed into
//! place, and every read or write is bounded by a timeout so a stalled disk
//! surfaces as a `PersistenceError` instead of hanging the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// File name used by the periodic save.
pub const SNAPSHOT_FILE: &str = "cache.json";

// == Snapshot ==
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<(String, CacheEntry)>,
    pub stats: CacheStats,
    /// Present in backups only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CacheConfig>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(items: Vec<(String, CacheEntry)>, stats: CacheStats) -> Self {
        Self {
            items,
            stats,
            config: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// `backup_<unix-ms>.json` for the given instant.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("backup_{}.json", at.timestamp_millis())
}

// == Write ==
/// Serializes `snapshot` to `dir/file_name`, creating `dir` if needed.
pub async fn write_snapshot(
    dir: &Path,
    file_name: &str,
    snapshot: &Snapshot,
    limit: Duration,
) -> Result<PathBuf> {
    let body = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| CacheError::Persistence(format!("Failed to serialize snapshot: {}", e)))?;

    let path = dir.join(file_name);
    let tmp = dir.join(format!(".{}.tmp", file_name));

    let write = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok::<_, std::io::Error>(())
    };

    timeout(limit, write)
        .await
        .map_err(|_| timed_out("write", &path, limit))??;

    debug!(path = %path.display(), bytes = body.len(), "Snapshot written");
    Ok(path)
}

// == Read ==
pub async fn read_snapshot(path: &Path, limit: Duration) -> Result<Snapshot> {
    let body = timeout(limit, tokio::fs::read(path))
        .await
        .map_err(|_| timed_out("read", path, limit))??;

    serde_json::from_slice(&body).map_err(|e| {
        CacheError::Persistence(format!("Failed to parse snapshot {}: {}", path.display(), e))
    })
}

fn timed_out(operation: &str, path: &Path, limit: Duration) -> CacheError {
    CacheError::Persistence(format!(
        "Snapshot {} of {} timed out after {:?}",
        operation,
        path.display(),
        limit
    ))
}
