//! Invalidation Engine
//!
//! Selects keys by tag overlap, key pattern or TTL expiry.

use std::collections::HashMap;

use regex::Regex;

use crate::cache::CacheEntry;

/// Keys whose tag set intersects `tags`.
pub fn keys_with_any_tag(entries: &HashMap<String, CacheEntry>, tags: &[String]) -> Vec<String> {
    entries
        .iter()
        .filter(|(_, entry)| tags.iter().any(|tag| entry.tags.contains(tag)))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Keys matched anywhere by `pattern`.
pub fn keys_matching(entries: &HashMap<String, CacheEntry>, pattern: &Regex) -> Vec<String> {
    entries
        .keys()
        .filter(|key| pattern.is_match(key))
        .cloned()
        .collect()
}

/// Keys whose TTL has elapsed at `now`.
pub fn expired_keys(entries: &HashMap<String, CacheEntry>, now: u64) -> Vec<String> {
    entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now))
        .map(|(key, _)| key.clone())
        .collect()
}
