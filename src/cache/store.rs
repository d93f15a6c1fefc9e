//! Cache Store Module
//!
//! The authoritative key → entry map plus aggregate stats. All mutation goes
//! through here so `total_size` and `total_items` are recomputed after every
//! structural change. The store is synchronous; callers serialize access
//! through a single lock.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::cache::events::{CacheEvent, EventBus, InvalidationSelector};
use crate::cache::stats::RemovalCause;
use crate::cache::transform::TransformPipeline;
use crate::cache::{checksum, current_timestamp_ms, eviction, invalidation, CacheEntry, CacheStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Lookup ==
/// Outcome of a read against the map.
#[derive(Debug)]
pub enum Lookup {
    /// Key present and live; carries a copy taken after the access was recorded
    Found(CacheEntry),
    /// Key present but past its TTL; it has been removed
    Expired,
    Missing,
}

/// Counts returned by [`CacheStore::recompress`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Recompression {
    pub entries: usize,
    pub bytes_saved: u64,
}

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
    max_size_bytes: u64,
    max_items: usize,
    events: EventBus,
}

impl CacheStore {
    // == Constructor ==
    pub fn new(config: &CacheConfig, events: EventBus) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_size_bytes: config.max_size_bytes,
            max_items: config.max_items,
            events,
        }
    }

    // == Insert ==
    /// Stores a fully built entry.
    ///
    /// Any previous entry under the same key is removed first, even when the
    /// new entry is then rejected for exceeding the limit on its own. If the
    /// new entry would push `total_size` over the limit, policy eviction frees
    /// at least its size.
    pub fn insert(&mut self, entry: CacheEntry) -> Result<()> {
        if self.entries.contains_key(&entry.key) {
            self.remove_with(&entry.key, RemovalCause::Explicit);
        }

        if entry.size_bytes > self.max_size_bytes {
            return Err(CacheError::CapacityExceeded {
                required: entry.size_bytes,
                limit: self.max_size_bytes,
            });
        }

        if self.stats.total_size + entry.size_bytes > self.max_size_bytes {
            let evicted = self.evict_items(entry.size_bytes);
            debug!(key = %entry.key, evicted, "Evicted entries to make room");
        }

        self.entries.insert(entry.key.clone(), entry);
        self.refresh_totals();
        Ok(())
    }

    // == Lookup ==
    /// Reads `key`, recording the access on a live entry.
    ///
    /// Misses (absent or expired) are counted here; hits are counted by the
    /// caller once the payload has been decoded successfully.
    pub fn lookup(&mut self, key: &str, now: u64) -> Lookup {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return Lookup::Missing;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.remove_with(key, RemovalCause::Invalidated);
            self.stats.record_miss();
            return Lookup::Expired;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                Lookup::Found(entry.clone())
            }
            None => Lookup::Missing,
        }
    }

    /// Live-entry check without touching stats or access bookkeeping.
    pub fn contains(&self, key: &str, now: u64) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Live keys, sorted.
    pub fn keys(&self, now: u64) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    // == Remove ==
    /// Explicit removal. Returns the removed entry, if any.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.remove_with(key, RemovalCause::Explicit)
    }

    fn remove_with(&mut self, key: &str, cause: RemovalCause) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.stats.record_removal(cause);
        self.refresh_totals();
        self.events.publish(CacheEvent::Remove {
            key: key.to_string(),
            item: Box::new(entry.clone()),
        });
        Some(entry)
    }

    fn remove_all(&mut self, keys: Vec<String>, cause: RemovalCause) -> (usize, u64) {
        let mut count = 0;
        let mut bytes = 0;
        for key in keys {
            if let Some(entry) = self.remove_with(&key, cause) {
                count += 1;
                bytes += entry.size_bytes;
            }
        }
        (count, bytes)
    }

    // == Invalidation ==
    pub fn invalidate_by_tags(&mut self, tags: &[String]) -> usize {
        let keys = invalidation::keys_with_any_tag(&self.entries, tags);
        let (count, _) = self.remove_all(keys, RemovalCause::Invalidated);

        self.events.publish(CacheEvent::Invalidate {
            selector: InvalidationSelector::Tags(tags.to_vec()),
            count,
        });
        count
    }

    pub fn invalidate_by_pattern(&mut self, pattern: &Regex) -> usize {
        let keys = invalidation::keys_matching(&self.entries, pattern);
        let (count, _) = self.remove_all(keys, RemovalCause::Invalidated);

        self.events.publish(CacheEvent::Invalidate {
            selector: InvalidationSelector::Pattern(pattern.as_str().to_string()),
            count,
        });
        count
    }

    // == Clear ==
    /// Drops every entry. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let size = self.entries.len();
        self.entries.clear();
        self.stats.evictions += size as u64;
        self.stats.invalidations += size as u64;
        self.refresh_totals();

        self.events.publish(CacheEvent::Clear { size });
        size
    }

    // == Expiry Sweep ==
    /// Removes every expired entry. Returns `(count, bytes)`.
    pub fn remove_expired(&mut self, now: u64) -> (usize, u64) {
        let keys = invalidation::expired_keys(&self.entries, now);
        self.remove_all(keys, RemovalCause::Invalidated)
    }

    // == Eviction ==
    /// Evicts by ascending score until at least `required` bytes are freed.
    pub fn evict_items(&mut self, required: u64) -> usize {
        let victims = eviction::select_for_space(&self.entries, required, current_timestamp_ms());
        self.remove_all(victims, RemovalCause::Policy).0
    }

    /// Evicts least recently accessed entries down to `max_items`.
    /// Returns `(count, bytes)`.
    pub fn trim_to_max_items(&mut self) -> (usize, u64) {
        let victims = eviction::select_lru_overflow(&self.entries, self.max_items);
        self.remove_all(victims, RemovalCause::Policy)
    }

    pub fn over_max_items(&self) -> bool {
        self.entries.len() > self.max_items
    }

    // == Re-compression ==
    /// Compresses stored payloads that are over threshold and still plain.
    ///
    /// Encrypted entries are skipped: compressing ciphertext would break the
    /// compress-then-encrypt order the flags describe.
    pub fn recompress(&mut self, pipeline: &TransformPipeline) -> Result<Recompression> {
        let mut outcome = Recompression::default();

        for entry in self.entries.values_mut() {
            let meta = &entry.metadata;
            if meta.compressed || meta.encrypted || !pipeline.should_compress(entry.value.len()) {
                continue;
            }

            let compressed = pipeline.compress(entry.value.as_bytes())?;
            let new_size = checksum::payload_size(&compressed);
            outcome.bytes_saved += entry.size_bytes.saturating_sub(new_size);
            outcome.entries += 1;

            entry.metadata.checksum = checksum::digest(&compressed);
            entry.metadata.compressed = true;
            entry.size_bytes = new_size;
            entry.value.0 = compressed;
        }

        self.refresh_totals();
        Ok(outcome)
    }

    // == Stats ==
    pub fn refresh_top_keys(&mut self) {
        self.stats.set_top_keys(
            self.entries
                .iter()
                .map(|(key, entry)| (key.as_str(), entry.access_count)),
        );
    }

    pub fn record_hit(&mut self, latency_ms: f64) {
        self.stats.record_hit();
        self.stats.record_latency(latency_ms);
    }

    pub fn record_set(&mut self, latency_ms: f64) {
        self.stats.record_latency(latency_ms);
    }

    pub fn record_error(&mut self) {
        self.stats.record_error();
    }

    /// Returns a copy of the current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    // == Snapshot Support ==
    /// Entries sorted by key, for deterministic snapshots.
    pub fn snapshot_items(&self) -> Vec<(String, CacheEntry)> {
        let mut items: Vec<(String, CacheEntry)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }

    /// Replaces contents and stats wholesale; totals are recomputed from `items`.
    pub fn replace(&mut self, items: Vec<(String, CacheEntry)>, stats: CacheStats) {
        self.entries = items
            .into_iter()
            .map(|(key, mut entry)| {
                entry.key = key.clone();
                (key, entry)
            })
            .collect();
        self.stats = stats;
        self.stats.update_hit_rate();
        self.refresh_totals();
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn refresh_totals(&mut self) {
        self.stats.total_items = self.entries.len();
        self.stats.total_size = self.entries.values().map(|e| e.size_bytes).sum();
        self.stats.entries_footprint = self.entries.values().map(CacheEntry::footprint).sum();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EntryMetadata, Priority};
    use tokio::sync::broadcast::error::TryRecvError;

    fn config(max_size_bytes: u64, max_items: usize) -> CacheConfig {
        CacheConfig {
            max_size_bytes,
            max_items,
            ..CacheConfig::default()
        }
    }

    fn store(max_size_bytes: u64, max_items: usize) -> CacheStore {
        CacheStore::new(&config(max_size_bytes, max_items), EventBus::new())
    }

    fn entry(key: &str, size: usize) -> CacheEntry {
        CacheEntry::new(key, vec![b'x'; size], 60_000, EntryMetadata::default())
    }

    #[test]
    fn test_store_new() {
        let store = store(1024, 10);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = store(1024, 10);
        store.insert(entry("key1", 10)).unwrap();

        match store.lookup("key1", current_timestamp_ms()) {
            Lookup::Found(found) => {
                assert_eq!(found.access_count, 1);
                assert_eq!(found.size_bytes, 10);
            }
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(store.stats().total_size, 10);
    }

    #[test]
    fn test_lookup_missing_counts_miss() {
        let mut store = store(1024, 10);
        assert!(matches!(store.lookup("nope", 0), Lookup::Missing));
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_lookup_expired_removes_entry() {
        let mut store = store(1024, 10);
        let mut e = entry("old", 10);
        e.ttl_ms = 1000;
        e.created_at = 0;
        store.insert(e).unwrap();

        assert!(matches!(store.lookup("old", 1001), Lookup::Expired));
        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn test_overwrite_keeps_totals_consistent() {
        let mut store = store(1024, 10);
        store.insert(entry("key1", 10)).unwrap();
        store.insert(entry("key1", 30)).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.total_size, 30);
        assert_eq!(stats.explicit_removals, 1);
    }

    #[test]
    fn test_remove() {
        let mut store = store(1024, 10);
        store.insert(entry("key1", 10)).unwrap();

        assert!(store.remove("key1").is_some());
        assert!(store.remove("key1").is_none());
        assert_eq!(store.stats().evictions, 1);
        assert_eq!(store.stats().total_size, 0);
    }

    #[test]
    fn test_size_pressure_evicts_lowest_score_entry() {
        let mut store = store(100, 10);
        let mut stale = entry("stale", 40).with_priority(Priority::Low);
        stale.created_at -= 60_000;
        stale.last_accessed -= 60_000;
        store.insert(stale).unwrap();
        store.insert(entry("fresh", 40).with_priority(Priority::Critical)).unwrap();

        store.insert(entry("new", 40)).unwrap();

        assert!(store.peek("fresh").is_none());
        assert!(store.peek("stale").is_some());
        assert!(store.stats().total_size <= 100);
        assert_eq!(store.stats().policy_evictions, 1);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let mut store = store(100, 10);
        store.insert(entry("keep", 10)).unwrap();

        let result = store.insert(entry("huge", 101));
        assert!(matches!(result, Err(CacheError::CapacityExceeded { .. })));
        assert!(store.peek("keep").is_some());
    }

    #[test]
    fn test_rejected_overwrite_drops_previous_value() {
        let mut store = store(100, 10);
        store.insert(entry("key1", 10)).unwrap();

        let result = store.insert(entry("key1", 101));
        assert!(matches!(result, Err(CacheError::CapacityExceeded { .. })));
        assert!(store.peek("key1").is_none());

        let stats = store.stats();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.explicit_removals, 1);
    }

    #[test]
    fn test_trim_to_max_items() {
        let mut store = store(1024, 2);
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            let mut e = entry(key, 1);
            e.last_accessed = 1_000 + i as u64;
            store.insert(e).unwrap();
        }
        assert!(store.over_max_items());

        let (count, bytes) = store.trim_to_max_items();
        assert_eq!((count, bytes), (1, 1));
        assert!(store.peek("a").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_invalidate_by_tags_and_pattern() {
        let mut store = store(1024, 10);
        store.insert(entry("user:1", 1).with_tags(["users"])).unwrap();
        store.insert(entry("user:2", 1).with_tags(["users", "vip"])).unwrap();
        store.insert(entry("order:1", 1).with_tags(["orders"])).unwrap();

        assert_eq!(store.invalidate_by_tags(&["vip".to_string()]), 1);
        assert_eq!(store.invalidate_by_pattern(&Regex::new("^user:").unwrap()), 1);
        assert_eq!(store.keys(0), vec!["order:1".to_string()]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = store(1024, 10);
        store.insert(entry("a", 5)).unwrap();
        store.insert(entry("b", 5)).unwrap();

        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
        let stats = store.stats();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.evictions, 2);
    }

    #[test]
    fn test_remove_expired() {
        let mut store = store(1024, 10);
        let mut old = entry("old", 7);
        old.created_at = 0;
        old.ttl_ms = 10;
        store.insert(old).unwrap();
        store.insert(entry("live", 3)).unwrap();

        assert_eq!(store.remove_expired(current_timestamp_ms()), (1, 7));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_recompress_plain_entries() {
        let pipeline = TransformPipeline::new(64, None);
        let mut store = store(1 << 20, 10);
        store.insert(entry("big", 4096)).unwrap();
        store.insert(entry("small", 8)).unwrap();

        let outcome = store.recompress(&pipeline).unwrap();
        assert_eq!(outcome.entries, 1);
        assert!(outcome.bytes_saved > 0);

        let big = store.peek("big").unwrap();
        assert!(big.metadata.compressed);
        assert!(checksum::verify(big.value.as_bytes(), &big.metadata.checksum).is_ok());
        assert_eq!(
            pipeline.decode(big.value.as_bytes(), true, false).unwrap(),
            vec![b'x'; 4096]
        );
        assert_eq!(store.stats().total_size, big.size_bytes + 8);
    }

    #[test]
    fn test_replace_recomputes_totals() {
        let mut store = store(1024, 10);
        let mut stale_stats = CacheStats::new();
        stale_stats.total_size = 999;
        stale_stats.hits = 3;

        store.replace(vec![("a".to_string(), entry("a", 12))], stale_stats);

        let stats = store.stats();
        assert_eq!(stats.total_size, 12);
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.hits, 3);
    }

    #[test]
    fn test_remove_publishes_event() {
        let events = EventBus::new();
        let mut rx = events.subscribe().unwrap();
        let mut store = CacheStore::new(&config(1024, 10), events);
        store.insert(entry("a", 1)).unwrap();

        store.remove("a");

        match rx.try_recv() {
            Ok(CacheEvent::Remove { key, .. }) => assert_eq!(key, "a"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
