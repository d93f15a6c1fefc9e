//! Request DTOs for the cache host API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::cache::SetOptions;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for the SET operation (PUT /set)
///
/// Options (`ttl_ms`, `tags`, `priority`, `metadata`, `compression`,
/// `encryption`) sit at the top level next to `key` and `value`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: serde_json::Value,
    #[serde(flatten)]
    pub options: SetOptions,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Request body for POST /invalidate/tags
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateTagsRequest {
    pub tags: Vec<String>,
}

/// Request body for POST /invalidate/pattern
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidatePatternRequest {
    /// Regular expression matched against keys
    pub pattern: String,
}

impl InvalidatePatternRequest {
    pub fn compile(&self) -> Result<Regex, String> {
        Regex::new(&self.pattern).map_err(|e| format!("Invalid pattern: {}", e))
    }
}

/// Request body for POST /restore
///
/// Names a snapshot file inside the configured persistence directory.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreRequest {
    pub file: String,
}

impl RestoreRequest {
    /// Joins `file` onto `dir`. Anything other than a plain file name
    /// (absolute paths, separators, `.` or `..`) is rejected.
    pub fn resolve(&self, dir: &Path) -> Result<PathBuf, String> {
        let mut components = Path::new(&self.file).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(dir.join(name)),
            _ => Err(format!(
                "Snapshot must be a file name inside the persistence directory, got '{}'",
                self.file
            )),
        }
    }
}
