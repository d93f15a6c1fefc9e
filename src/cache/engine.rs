//! Advanced Cache
//!
//! The public, cloneable handle over one cache instance. It owns the store
//! lock, the transform pipeline, the event bus and the background scheduler.
//!
//! Data-path operations are fail-soft: an internal failure is counted in
//! `errors`, published as an `error` event, logged, and turned into
//! `false`/`None`. Nothing here panics on bad input or corrupt entries.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Instant;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::cache::events::{CacheEvent, EventBus};
use crate::cache::memory::MemorySampler;
use crate::cache::persistence::{self, Snapshot, SNAPSHOT_FILE};
use crate::cache::store::{CacheStore, Lookup, Recompression};
use crate::cache::transform::TransformPipeline;
use crate::cache::{
    checksum, current_timestamp_ms, CacheEntry, CacheStats, EntryMetadata, InvalidationRule,
    Priority,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::Scheduler;

/// `get_status().healthy` turns false at this many recorded errors.
pub const UNHEALTHY_ERROR_COUNT: u64 = 100;

/// Baseline hit rate (percent) the optimize report measures against.
const HIT_RATE_BASELINE: f64 = 50.0;

// == Set Options ==
/// Per-call options for [`AdvancedCache::set`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetOptions {
    /// `None` or `0` uses the configured default TTL
    pub ttl_ms: Option<u64>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub metadata: MetadataOptions,
    /// `Some(false)` disables compression for this entry
    pub compression: Option<bool>,
    pub encryption: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn metadata(mut self, metadata: MetadataOptions) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = Some(enabled);
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encryption = true;
        self
    }
}

/// Caller-supplied metadata. Transform flags and checksum are always computed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetadataOptions {
    pub source: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub invalidation_rules: Vec<InvalidationRule>,
}

// == Reports ==
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub healthy: bool,
    pub memory_usage: u64,
    pub hit_rate: f64,
    pub total_items: usize,
    pub total_size: u64,
    pub uptime_secs: u64,
    pub config: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeReport {
    pub duration_ms: u64,
    /// Expired plus trimmed entries
    pub removed_items: usize,
    pub expired_items: usize,
    pub trimmed_items: usize,
    pub recompressed_items: usize,
    /// Bytes freed by removal plus bytes saved by re-compression
    pub memory_saved: u64,
    /// `max(0, hit_rate - 50)`
    pub hit_rate_improvement: f64,
}

// == Advanced Cache ==
#[derive(Debug, Clone)]
pub struct AdvancedCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Mutex<CacheStore>,
    pipeline: TransformPipeline,
    events: EventBus,
    config: CacheConfig,
    started: Instant,
    scheduler: StdMutex<Option<Scheduler>>,
    memory: StdMutex<MemorySampler>,
}

/// Non-owning handle held by background tasks.
#[derive(Debug, Clone)]
pub struct WeakCache(Weak<Inner>);

impl WeakCache {
    pub fn upgrade(&self) -> Option<AdvancedCache> {
        self.0.upgrade().map(|inner| AdvancedCache { inner })
    }
}

impl AdvancedCache {
    // == Constructor ==
    /// Creates a cache and starts its cleanup and persistence timers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        let events = EventBus::new();
        let cache = Self {
            inner: Arc::new(Inner {
                store: Mutex::new(CacheStore::new(&config, events.clone())),
                pipeline: TransformPipeline::new(
                    config.compression_threshold_bytes,
                    config.encryption_key.as_deref(),
                ),
                events,
                config,
                started: Instant::now(),
                scheduler: StdMutex::new(None),
                memory: StdMutex::new(MemorySampler::new()),
            }),
        };

        let scheduler = Scheduler::start(&cache);
        if let Ok(mut slot) = cache.inner.scheduler.lock() {
            *slot = Some(scheduler);
        }

        info!(
            max_size_bytes = cache.inner.config.max_size_bytes,
            max_items = cache.inner.config.max_items,
            persistence = cache.inner.config.persistence_enabled,
            "Advanced cache started"
        );
        cache
    }

    pub fn downgrade(&self) -> WeakCache {
        WeakCache(Arc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Subscribes to lifecycle events; `None` after [`close`](Self::close).
    pub fn subscribe(&self) -> Option<broadcast::Receiver<CacheEvent>> {
        self.inner.events.subscribe()
    }

    // == Set ==
    /// Stores `value` under `key`. Returns `false` on any failure.
    pub async fn set<T>(&self, key: &str, value: &T, options: SetOptions) -> bool
    where
        T: Serialize + ?Sized,
    {
        let started = Instant::now();
        match self.try_set(key, value, options, started).await {
            Ok(()) => true,
            Err(err) => {
                self.report_failure(Some(key), "set", &err).await;
                false
            }
        }
    }

    async fn try_set<T>(&self, key: &str, value: &T, options: SetOptions, started: Instant) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_value(value)
            .map_err(|e| CacheError::Transform(format!("Failed to serialize value: {}", e)))?;
        let raw = serde_json::to_vec(&json)
            .map_err(|e| CacheError::Transform(format!("Failed to serialize value: {}", e)))?;

        let ttl_ms = options
            .ttl_ms
            .filter(|ttl| *ttl > 0)
            .unwrap_or(self.inner.config.default_ttl_ms);

        let encoded = self.inner.pipeline.encode(
            raw,
            options.compression != Some(false),
            options.encryption,
        )?;

        let defaults = EntryMetadata::default();
        let metadata = EntryMetadata {
            source: options.metadata.source.unwrap_or(defaults.source),
            version: options.metadata.version.unwrap_or(defaults.version),
            dependencies: options.metadata.dependencies,
            invalidation_rules: options.metadata.invalidation_rules,
            compressed: encoded.compressed,
            encrypted: encoded.encrypted,
            checksum: encoded.checksum,
        };

        let entry = CacheEntry::new(key, encoded.bytes, ttl_ms, metadata)
            .with_tags(options.tags)
            .with_priority(options.priority);

        {
            let mut store = self.inner.store.lock().await;
            store.insert(entry.clone())?;
            store.record_set(elapsed_ms(started));
        }

        self.inner.events.publish(CacheEvent::Set {
            key: key.to_string(),
            value: json,
            item: Box::new(entry),
        });
        Ok(())
    }

    // == Get ==
    /// Returns the value under `key`, or `None` if absent, expired or unreadable.
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let started = Instant::now();
        let entry = match self.inner.store.lock().await.lookup(key, current_timestamp_ms()) {
            Lookup::Found(entry) => entry,
            Lookup::Expired | Lookup::Missing => return None,
        };

        match self.decode::<T>(&entry) {
            Ok((json, value)) => {
                self.inner.store.lock().await.record_hit(elapsed_ms(started));
                self.inner.events.publish(CacheEvent::Get {
                    key: key.to_string(),
                    value: json,
                    item: Box::new(entry),
                });
                Some(value)
            }
            Err(err) => {
                self.report_failure(Some(key), "get", &err).await;
                None
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, entry: &CacheEntry) -> Result<(serde_json::Value, T)> {
        checksum::verify(entry.value.as_bytes(), &entry.metadata.checksum)?;

        let raw = self.inner.pipeline.decode(
            entry.value.as_bytes(),
            entry.metadata.compressed,
            entry.metadata.encrypted,
        )?;
        let json: serde_json::Value = serde_json::from_slice(&raw)
            .map_err(|e| CacheError::Transform(format!("Stored payload is not JSON: {}", e)))?;
        let value = T::deserialize(&json)
            .map_err(|e| CacheError::Transform(format!("Value has unexpected shape: {}", e)))?;
        Ok((json, value))
    }

    // == Remove ==
    pub async fn remove(&self, key: &str) -> bool {
        self.inner.store.lock().await.remove(key).is_some()
    }

    /// Live-key check with no stats or access side effects.
    pub async fn contains(&self, key: &str) -> bool {
        self.inner.store.lock().await.contains(key, current_timestamp_ms())
    }

    /// Live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.inner.store.lock().await.keys(current_timestamp_ms())
    }

    /// Stored entries, including any not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.store.lock().await.is_empty()
    }

    /// Copy of the stored entry, without touching it.
    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.store.lock().await.peek(key).cloned()
    }

    // == Invalidation ==
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> usize {
        let count = self.inner.store.lock().await.invalidate_by_tags(tags);
        debug!(?tags, count, "Invalidated by tags");
        count
    }

    pub async fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        let count = self.inner.store.lock().await.invalidate_by_pattern(pattern);
        debug!(pattern = pattern.as_str(), count, "Invalidated by pattern");
        count
    }

    /// Drops every entry. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        self.inner.store.lock().await.clear()
    }

    // == Stats ==
    /// Copy of the statistics with a fresh process memory sample.
    pub async fn get_stats(&self) -> CacheStats {
        let mut stats = self.inner.store.lock().await.stats();
        stats.memory_usage = self.sample_memory();
        stats
    }

    fn sample_memory(&self) -> u64 {
        self.inner
            .memory
            .lock()
            .map(|mut sampler| sampler.sample())
            .unwrap_or(0)
    }

    pub async fn get_status(&self) -> CacheStatus {
        let stats = self.get_stats().await;
        CacheStatus {
            healthy: stats.errors < UNHEALTHY_ERROR_COUNT,
            memory_usage: stats.memory_usage,
            hit_rate: stats.hit_rate,
            total_items: stats.total_items,
            total_size: stats.total_size,
            uptime_secs: self.inner.started.elapsed().as_secs(),
            config: self.inner.config.clone(),
        }
    }

    // == Sweep ==
    /// Removes expired entries, then trims to `max_items`. Returns `(expired, trimmed)`.
    pub async fn run_cleanup(&self) -> (usize, usize) {
        let mut store = self.inner.store.lock().await;
        let (expired, _) = store.remove_expired(current_timestamp_ms());
        let trimmed = if store.over_max_items() {
            store.trim_to_max_items().0
        } else {
            0
        };
        (expired, trimmed)
    }

    // == Optimize ==
    /// Sweep, count trim, re-compression pass and leaderboard refresh.
    pub async fn optimize(&self) -> OptimizeReport {
        let started = Instant::now();

        let (expired, trimmed, recompressed, freed, hit_rate) = {
            let mut store = self.inner.store.lock().await;
            let (expired, expired_bytes) = store.remove_expired(current_timestamp_ms());
            let (trimmed, trimmed_bytes) = store.trim_to_max_items();

            let recompressed = match store.recompress(&self.inner.pipeline) {
                Ok(outcome) => outcome,
                Err(err) => {
                    store.record_error();
                    self.publish_error(None, "optimize", &err);
                    Recompression::default()
                }
            };

            store.refresh_top_keys();
            let freed = expired_bytes + trimmed_bytes + recompressed.bytes_saved;
            (expired, trimmed, recompressed, freed, store.stats().hit_rate)
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let removed_items = expired + trimmed;
        self.inner.events.publish(CacheEvent::Optimize {
            duration_ms,
            removed_items,
        });

        info!(
            duration_ms,
            expired,
            trimmed,
            recompressed = recompressed.entries,
            "Cache optimized"
        );

        OptimizeReport {
            duration_ms,
            removed_items,
            expired_items: expired,
            trimmed_items: trimmed,
            recompressed_items: recompressed.entries,
            memory_saved: freed,
            hit_rate_improvement: (hit_rate - HIT_RATE_BASELINE).max(0.0),
        }
    }

    // == Persistence ==
    /// Writes a timestamped backup including config. Returns its path.
    pub async fn backup(&self) -> Result<PathBuf> {
        let snapshot = self.snapshot().await.with_config(self.inner.config.clone());
        let file_name = persistence::backup_file_name(snapshot.timestamp);

        match persistence::write_snapshot(
            &self.inner.config.persistence_path,
            &file_name,
            &snapshot,
            self.inner.config.io_timeout(),
        )
        .await
        {
            Ok(path) => {
                info!(path = %path.display(), items = snapshot.items.len(), "Cache backup written");
                self.inner
                    .events
                    .publish(CacheEvent::Backup { path: path.clone() });
                Ok(path)
            }
            Err(err) => {
                self.report_failure(None, "backup", &err).await;
                Err(err)
            }
        }
    }

    /// Writes the periodic `cache.json` snapshot.
    pub async fn save_to_disk(&self) -> Result<PathBuf> {
        let snapshot = self.snapshot().await;

        match persistence::write_snapshot(
            &self.inner.config.persistence_path,
            SNAPSHOT_FILE,
            &snapshot,
            self.inner.config.io_timeout(),
        )
        .await
        {
            Ok(path) => Ok(path),
            Err(err) => {
                self.report_failure(None, "persistence", &err).await;
                Err(err)
            }
        }
    }

    /// Replaces the store and stats with the contents of a snapshot file.
    pub async fn restore(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let snapshot = match persistence::read_snapshot(path, self.inner.config.io_timeout()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.report_failure(None, "restore", &err).await;
                return Err(err);
            }
        };

        let items = snapshot.items.len();
        self.inner
            .store
            .lock()
            .await
            .replace(snapshot.items, snapshot.stats);

        info!(path = %path.display(), items, "Cache restored");
        self.inner.events.publish(CacheEvent::Restore {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn snapshot(&self) -> Snapshot {
        let (items, mut stats) = {
            let store = self.inner.store.lock().await;
            (store.snapshot_items(), store.stats())
        };
        stats.memory_usage = self.sample_memory();
        Snapshot::new(items, stats)
    }

    // == Close ==
    /// Stops the timers, flushes once, clears the store and detaches subscribers.
    ///
    /// Only the first call does anything.
    pub async fn close(&self) {
        let scheduler = self
            .inner
            .scheduler
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let Some(scheduler) = scheduler else {
            return;
        };
        scheduler.stop();

        if self.inner.config.persistence_enabled {
            // Failure is already counted and published.
            let _ = self.save_to_disk().await;
        }

        self.clear().await;
        self.inner.events.close();
        info!("Advanced cache closed");
    }

    // == Failure Reporting ==
    async fn report_failure(&self, key: Option<&str>, operation: &str, err: &CacheError) {
        self.inner.store.lock().await.record_error();
        self.publish_error(key, operation, err);
    }

    fn publish_error(&self, key: Option<&str>, operation: &str, err: &CacheError) {
        warn!(key = key.unwrap_or("-"), operation, error = %err, "Cache operation failed");
        self.inner.events.publish(CacheEvent::Error {
            key: key.map(String::from),
            operation: Some(operation.to_string()),
            error: err.to_string(),
        });
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
