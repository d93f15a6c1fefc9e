//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Config ==
/// Cache engine configuration.
///
/// Immutable once handed to [`AdvancedCache::new`](crate::cache::AdvancedCache::new).
/// The encryption key is never serialized, so it does not leak into backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on the sum of all stored entry sizes
    pub max_size_bytes: u64,
    /// Upper bound on entry count, enforced by the cleanup sweep
    pub max_items: usize,
    /// TTL applied when a `set` does not provide one
    pub default_ttl_ms: u64,
    /// Interval between expiry sweeps
    pub cleanup_interval_ms: u64,
    /// Serialized values larger than this are gzip-compressed
    pub compression_threshold_bytes: usize,
    /// Passphrase the AES-256 key is derived from; a random key is used when absent
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
    /// Enables the periodic `cache.json` snapshot
    pub persistence_enabled: bool,
    /// Directory for snapshots and backups
    pub persistence_path: PathBuf,
    /// Interval between periodic snapshots
    pub persistence_interval_ms: u64,
    /// Bound on a single snapshot read or write
    pub io_timeout_ms: u64,
    /// Accepted for compatibility; no replication is performed
    pub clustering: bool,
    /// Accepted for compatibility; no replication is performed
    pub cluster_nodes: Vec<String>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE_BYTES` (default: 100 MiB)
    /// - `CACHE_MAX_ITEMS` (default: 10000)
    /// - `CACHE_DEFAULT_TTL_MS` (default: 3600000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` (default: 300000)
    /// - `CACHE_COMPRESSION_THRESHOLD_BYTES` (default: 1024)
    /// - `CACHE_ENCRYPTION_KEY` (default: unset)
    /// - `CACHE_PERSISTENCE_ENABLED` (default: true)
    /// - `CACHE_PERSISTENCE_PATH` (default: ./data/cache)
    /// - `CACHE_PERSISTENCE_INTERVAL_MS` (default: 60000)
    /// - `CACHE_IO_TIMEOUT_MS` (default: 5000)
    /// - `CACHE_CLUSTERING` / `CACHE_CLUSTER_NODES` (comma separated, inert)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size_bytes: env_or("CACHE_MAX_SIZE_BYTES", defaults.max_size_bytes),
            max_items: env_or("CACHE_MAX_ITEMS", defaults.max_items),
            default_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            cleanup_interval_ms: env_or("CACHE_CLEANUP_INTERVAL_MS", defaults.cleanup_interval_ms),
            compression_threshold_bytes: env_or(
                "CACHE_COMPRESSION_THRESHOLD_BYTES",
                defaults.compression_threshold_bytes,
            ),
            encryption_key: env::var("CACHE_ENCRYPTION_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            persistence_enabled: env_or("CACHE_PERSISTENCE_ENABLED", defaults.persistence_enabled),
            persistence_path: env::var("CACHE_PERSISTENCE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.persistence_path),
            persistence_interval_ms: env_or(
                "CACHE_PERSISTENCE_INTERVAL_MS",
                defaults.persistence_interval_ms,
            ),
            io_timeout_ms: env_or("CACHE_IO_TIMEOUT_MS", defaults.io_timeout_ms),
            clustering: env_or("CACHE_CLUSTERING", defaults.clustering),
            cluster_nodes: env::var("CACHE_CLUSTER_NODES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }

    pub fn persistence_interval(&self) -> Duration {
        Duration::from_millis(self.persistence_interval_ms.max(1))
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 100 * 1024 * 1024,
            max_items: 10_000,
            default_ttl_ms: 3_600_000,
            cleanup_interval_ms: 300_000,
            compression_threshold_bytes: 1024,
            encryption_key: None,
            persistence_enabled: true,
            persistence_path: PathBuf::from("./data/cache"),
            persistence_interval_ms: 60_000,
            io_timeout_ms: 5_000,
            clustering: false,
            cluster_nodes: Vec::new(),
        }
    }
}

// == Server Config ==
/// HTTP host configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
}

impl ServerConfig {
    /// Loads `SERVER_PORT` (default: 3000).
    pub fn from_env() -> Self {
        Self {
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { server_port: 3000 }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_items, 10_000);
        assert_eq!(config.default_ttl_ms, 3_600_000);
        assert_eq!(config.cleanup_interval_ms, 300_000);
        assert_eq!(config.compression_threshold_bytes, 1024);
        assert!(config.persistence_enabled);
        assert!(!config.clustering);
        assert!(config.cluster_nodes.is_empty());
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("CACHE_MAX_ITEMS");
        env::remove_var("CACHE_DEFAULT_TTL_MS");
        env::remove_var("CACHE_ENCRYPTION_KEY");
        env::remove_var("CACHE_CLUSTER_NODES");

        let config = CacheConfig::from_env();
        assert_eq!(config.max_items, 10_000);
        assert_eq!(config.default_ttl_ms, 3_600_000);
        assert!(config.encryption_key.is_none());
        assert!(config.cluster_nodes.is_empty());
    }

    #[test]
    fn test_encryption_key_not_serialized() {
        let config = CacheConfig {
            encryption_key: Some("secret".to_string()),
            ..CacheConfig::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));

        let back: CacheConfig = serde_json::from_str(&json).unwrap();
        assert!(back.encryption_key.is_none());
        assert_eq!(back.max_items, config.max_items);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"max_items": 5}"#).unwrap();
        assert_eq!(config.max_items, 5);
        assert_eq!(config.compression_threshold_bytes, 1024);
    }

    #[test]
    fn test_server_config_default() {
        assert_eq!(ServerConfig::default().server_port, 3000);
    }
}
