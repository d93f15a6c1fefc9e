//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, removals, errors, latency
//! and the most-accessed keys.

use serde::{Deserialize, Serialize};

/// Number of keys kept in the access leaderboard.
pub const TOP_KEYS_LIMIT: usize = 10;

// == Top Key ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopKey {
    pub key: String,
    pub access_count: u64,
}

// == Removal Cause ==
/// Why an entry left the store. All causes count toward `evictions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// `remove()` or replacement by a `set` on the same key
    Explicit,
    /// Size- or count-bounded eviction
    Policy,
    /// TTL expiry, tag/pattern invalidation or `clear()`
    Invalidated,
}

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (not found, expired or unreadable)
    pub misses: u64,
    /// `hits / (hits + misses)` as a percentage
    pub hit_rate: f64,
    pub total_items: usize,
    /// Sum of `size_bytes` across all entries
    pub total_size: u64,
    /// Resident memory of the process, sampled when stats are read
    pub memory_usage: u64,
    /// Estimated footprint of the stored entries
    pub entries_footprint: u64,
    /// Every removal, whatever the cause
    pub evictions: u64,
    pub explicit_removals: u64,
    pub policy_evictions: u64,
    pub invalidations: u64,
    pub errors: u64,
    /// Running average of `get`/`set` latency in milliseconds
    pub average_access_time_ms: f64,
    pub top_keys: Vec<TopKey>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Recomputes `hit_rate`, `0.0` when no reads have happened.
    pub fn update_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        };
    }

    // == Record Hit ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.update_hit_rate();
    }

    // == Record Miss ==
    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.update_hit_rate();
    }

    // == Record Removal ==
    pub fn record_removal(&mut self, cause: RemovalCause) {
        self.evictions += 1;
        match cause {
            RemovalCause::Explicit => self.explicit_removals += 1,
            RemovalCause::Policy => self.policy_evictions += 1,
            RemovalCause::Invalidated => self.invalidations += 1,
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    // == Record Latency ==
    /// Folds a sample into the running average as `(avg + sample) / 2`.
    pub fn record_latency(&mut self, millis: f64) {
        self.average_access_time_ms = (self.average_access_time_ms + millis) / 2.0;
    }

    // == Top Keys ==
    /// Replaces the leaderboard with the highest access counts, ties by key.
    pub fn set_top_keys<'a, I>(&mut self, counts: I)
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut ranked: Vec<TopKey> = counts
            .into_iter()
            .map(|(key, access_count)| TopKey {
                key: key.to_string(),
                access_count,
            })
            .collect();
        ranked.sort_by(|a, b| b.access_count.cmp(&a.access_count).then_with(|| a.key.cmp(&b.key)));
        ranked.truncate(TOP_KEYS_LIMIT);
        self.top_keys = ranked;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate, 100.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate, 50.0);
    }

    #[test]
    fn test_removal_causes_share_eviction_counter() {
        let mut stats = CacheStats::new();
        stats.record_removal(RemovalCause::Explicit);
        stats.record_removal(RemovalCause::Policy);
        stats.record_removal(RemovalCause::Policy);
        stats.record_removal(RemovalCause::Invalidated);

        assert_eq!(stats.evictions, 4);
        assert_eq!(stats.explicit_removals, 1);
        assert_eq!(stats.policy_evictions, 2);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn test_latency_running_average() {
        let mut stats = CacheStats::new();
        stats.record_latency(4.0);
        assert_eq!(stats.average_access_time_ms, 2.0);
        stats.record_latency(2.0);
        assert_eq!(stats.average_access_time_ms, 2.0);
    }

    #[test]
    fn test_top_keys_limited_and_sorted() {
        let mut stats = CacheStats::new();
        let keys: Vec<String> = (0..15).map(|i| format!("k{:02}", i)).collect();
        stats.set_top_keys(keys.iter().enumerate().map(|(i, k)| (k.as_str(), i as u64)));

        assert_eq!(stats.top_keys.len(), TOP_KEYS_LIMIT);
        assert_eq!(stats.top_keys[0].key, "k14");
        assert_eq!(stats.top_keys[9].key, "k05");
    }
}
