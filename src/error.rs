//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror. Public cache operations
//! never return these for data-path failures; they are counted, published on
//! the event channel, and surfaced as `false`/`None`. They do cross the API
//! boundary for persistence calls and for the HTTP host.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (or expired, or unreadable)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Compression, decompression, checksum or (de)serialization failure
    #[error("Transform error: {0}")]
    Transform(String),

    /// Encryption or decryption failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Snapshot read, write or parse failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A single entry can never fit under the size limit
    #[error("Capacity exceeded: entry needs {required} bytes, limit is {limit}")]
    CapacityExceeded { required: u64, limit: u64 },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Persistence(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::Transform(_)
            | CacheError::Crypto(_)
            | CacheError::Persistence(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
