//! Cache Module
//!
//! Self-managing in-process cache: TTL expiry, tag and pattern invalidation,
//! compress/encrypt transforms, weighted eviction, snapshots and lifecycle
//! events.

pub mod checksum;
mod engine;
mod entry;
pub mod events;
pub mod eviction;
pub mod invalidation;
pub mod memory;
pub mod persistence;
mod stats;
pub mod store;
pub mod transform;


// Re-export public types
pub use engine::{
    AdvancedCache, CacheStatus, MetadataOptions, OptimizeReport, SetOptions, WeakCache,
    UNHEALTHY_ERROR_COUNT,
};
pub use entry::{
    current_timestamp_ms, CacheEntry, EntryMetadata, InvalidationRule, Priority, RuleAction,
    RuleKind, StoredValue,
};
pub use events::{CacheEvent, EventBus, InvalidationSelector};
pub use stats::{CacheStats, RemovalCause, TopKey, TOP_KEYS_LIMIT};
pub use store::CacheStore;
pub use transform::TransformPipeline;
