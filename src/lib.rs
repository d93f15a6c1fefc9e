//! Advanced Cache - a self-managing in-process key/value cache
//!
//! Provides TTL expiry, tag- and pattern-based invalidation, gzip and
//! AES-256-GCM payload transforms, size- and count-bounded eviction,
//! periodic snapshots and a lifecycle event channel.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{AdvancedCache, CacheEvent, CacheStats, Priority, SetOptions};
pub use config::{CacheConfig, ServerConfig};
pub use error::CacheError;
