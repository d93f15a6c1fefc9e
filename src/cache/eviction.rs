//! Eviction Policy
//!
//! Chooses which keys to drop under size pressure (weighted score) or
//! count pressure (least recently accessed). Both functions only select;
//! the store performs the removal.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cache::CacheEntry;

// == Size-Based Selection ==
/// Selects keys to free at least `required` bytes.
///
/// Entries are ranked by [`CacheEntry::eviction_score`], lowest first (ties
/// by key), and taken greedily until the freed total reaches `required`. Returns fewer
/// bytes than asked only when the whole store is smaller than `required`.
pub fn select_for_space(
    entries: &HashMap<String, CacheEntry>,
    required: u64,
    now: u64,
) -> Vec<String> {
    if required == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&String, f64, u64)> = entries
        .iter()
        .map(|(key, entry)| (key, entry.eviction_score(now), entry.size_bytes))
        .collect();
    ranked.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut freed = 0u64;
    let mut victims = Vec::new();
    for (key, _, size) in ranked {
        if freed >= required {
            break;
        }
        freed += size;
        victims.push(key.clone());
    }
    victims
}

// == Count-Based Selection ==
/// Selects the least recently accessed keys so that at most `max_items` remain.
pub fn select_lru_overflow(entries: &HashMap<String, CacheEntry>, max_items: usize) -> Vec<String> {
    let overflow = entries.len().saturating_sub(max_items);
    if overflow == 0 {
        return Vec::new();
    }

    let mut by_access: Vec<(&String, u64)> = entries
        .iter()
        .map(|(key, entry)| (key, entry.last_accessed))
        .collect();
    by_access.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    by_access
        .into_iter()
        .take(overflow)
        .map(|(key, _)| key.clone())
        .collect()
}
