//! Background Tasks Module
//!
//! Periodic work owned by a cache instance.
//!
//! # Tasks
//! - Cleanup: sweeps expired entries and trims to `max_items`
//! - Persistence: writes the `cache.json` snapshot

mod cleanup;
mod persistence;
mod scheduler;

pub use cleanup::spawn_cleanup_task;
pub use persistence::spawn_persistence_task;
pub use scheduler::Scheduler;
