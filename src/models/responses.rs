//! Response DTOs for the cache host API
//!
//! Defines the structure of outgoing HTTP response bodies. Stats, status and
//! optimize reports are returned as the engine's own serializable types.

use std::path::PathBuf;

use serde::Serialize;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: serde_json::Value,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for invalidation and clear endpoints
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Number of entries removed
    pub count: usize,
}

/// Response body for backup and restore endpoints
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub message: String,
    /// File name to pass back to POST /restore
    pub file: String,
    pub path: PathBuf,
}

impl SnapshotResponse {
    pub fn backup(path: PathBuf) -> Self {
        Self::new("Backup written", path)
    }

    pub fn restored(path: PathBuf) -> Self {
        Self::new("Cache restored", path)
    }

    fn new(message: &str, path: PathBuf) -> Self {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            message: message.to_string(),
            file,
            path,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a HealthResponse from the cache's health flag
    pub fn from_health(healthy: bool) -> Self {
        Self {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("test_key", json!({"nested": [1, 2]}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["key"], "test_key");
        assert_eq!(json["value"]["nested"][1], 2);
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("deleted_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("deleted_key"));
        assert!(json.contains("deleted"));
    }

    #[test]
    fn test_snapshot_response_serialize() {
        let resp = SnapshotResponse::backup(PathBuf::from("/tmp/backup_1.json"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["path"], "/tmp/backup_1.json");
        assert_eq!(json["file"], "backup_1.json");
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::from_health(true);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
        assert_eq!(HealthResponse::from_health(false).status, "degraded");
    }
}
