//! Cache Entry Module
//!
//! Defines the structure for individual cache entries, their priority and
//! metadata, and the TTL and eviction-score calculations.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Priority ==
/// Eviction tie-breaker weight. Higher weight is evicted earlier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn weight(self) -> f64 {
        match self {
            Priority::Low => 4.0,
            Priority::Medium => 3.0,
            Priority::High => 2.0,
            Priority::Critical => 1.0,
        }
    }
}

// == Invalidation Rules ==
/// Declared invalidation rule. Stored with the entry, never evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default)]
    pub value: serde_json::Value,
    pub action: RuleAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Time,
    Dependency,
    Tag,
    Pattern,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Invalidate,
    Refresh,
    Notify,
}

// == Entry Metadata ==
/// Informational metadata plus the flags needed to reverse the transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub source: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub invalidation_rules: Vec<InvalidationRule>,
    pub compressed: bool,
    pub encrypted: bool,
    /// SHA-256 hex digest of the stored bytes
    pub checksum: String,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            source: "cache".to_string(),
            version: "1.0.0".to_string(),
            dependencies: Vec::new(),
            invalidation_rules: Vec::new(),
            compressed: false,
            encrypted: false,
            checksum: String::new(),
        }
    }
}

// == Stored Value ==
/// Post-transform payload bytes. Base64-encoded when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredValue(#[serde(with = "base64_bytes")] pub Vec<u8>);

impl StoredValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// == Cache Entry ==
/// Represents a single cache entry with its transformed value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: StoredValue,
    /// Lifetime measured from `created_at`; access does not extend it
    pub ttl_ms: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last successful read (Unix milliseconds)
    pub last_accessed: u64,
    pub access_count: u64,
    /// Byte length of the stored representation
    pub size_bytes: u64,
    pub tags: BTreeSet<String>,
    pub priority: Priority,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(key: impl Into<String>, value: Vec<u8>, ttl_ms: u64, metadata: EntryMetadata) -> Self {
        let now = current_timestamp_ms();
        let size_bytes = value.len() as u64;

        Self {
            key: key.into(),
            value: StoredValue(value),
            ttl_ms,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            size_bytes,
            tags: BTreeSet::new(),
            priority: Priority::default(),
            metadata,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    // == Is Expired ==
    /// An entry is expired once its age strictly exceeds its TTL.
    pub fn is_expired(&self, now: u64) -> bool {
        self.age_ms(now) > self.ttl_ms
    }

    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    pub fn idle_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_accessed)
    }

    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.ttl_ms.saturating_sub(self.age_ms(now))
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    // == Eviction Score ==
    /// `age_s + idle_s + priority_weight - access_count * 0.1`.
    ///
    /// Size pressure evicts in ascending score order.
    pub fn eviction_score(&self, now: u64) -> f64 {
        let age_secs = self.age_ms(now) as f64 / 1000.0;
        let idle_secs = self.idle_ms(now) as f64 / 1000.0;

        age_secs + idle_secs + self.priority.weight() - self.access_count as f64 * 0.1
    }

    /// Rough in-memory footprint used for the `entries_footprint` stat.
    pub fn footprint(&self) -> u64 {
        let tags: usize = self.tags.iter().map(String::len).sum();
        let meta = self.metadata.source.len()
            + self.metadata.version.len()
            + self.metadata.checksum.len()
            + self.metadata.dependencies.iter().map(String::len).sum::<usize>();

        (std::mem::size_of::<Self>() + self.key.len() + self.value.len() + tags + meta) as u64
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
