//! Notification Channel
//!
//! Lifecycle events published on a tokio broadcast channel. Subscribers are
//! observers only: the cache never waits on them, and a publish with no
//! receivers is dropped.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::cache::CacheEntry;

/// Buffered events per subscriber before lagging receivers skip ahead.
const EVENT_BUFFER: usize = 1024;

// == Cache Event ==
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CacheEvent {
    Set {
        key: String,
        value: serde_json::Value,
        item: Box<CacheEntry>,
    },
    Get {
        key: String,
        value: serde_json::Value,
        item: Box<CacheEntry>,
    },
    Remove {
        key: String,
        item: Box<CacheEntry>,
    },
    Invalidate {
        #[serde(flatten)]
        selector: InvalidationSelector,
        count: usize,
    },
    Clear {
        size: usize,
    },
    Optimize {
        duration_ms: u64,
        removed_items: usize,
    },
    Backup {
        path: PathBuf,
    },
    Restore {
        path: PathBuf,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
        error: String,
    },
}

impl CacheEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::Set { .. } => "set",
            CacheEvent::Get { .. } => "get",
            CacheEvent::Remove { .. } => "remove",
            CacheEvent::Invalidate { .. } => "invalidate",
            CacheEvent::Clear { .. } => "clear",
            CacheEvent::Optimize { .. } => "optimize",
            CacheEvent::Backup { .. } => "backup",
            CacheEvent::Restore { .. } => "restore",
            CacheEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationSelector {
    Tags(Vec<String>),
    Pattern(String),
}

// == Event Bus ==
/// Cloneable publisher handle. `close` detaches every subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<RwLock<Option<broadcast::Sender<CacheEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
        }
    }

    /// Returns a new receiver, or `None` once the bus is closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<CacheEvent>> {
        self.sender
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(broadcast::Sender::subscribe))
    }

    pub fn publish(&self, event: CacheEvent) {
        if let Ok(guard) = self.sender.read() {
            if let Some(sender) = guard.as_ref() {
                // Err only means nobody is listening.
                let _ = sender.send(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }

    /// Drops the sender; receivers observe `RecvError::Closed`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.write() {
            guard.take();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
