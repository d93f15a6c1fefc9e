//! API Handlers
//!
//! HTTP request handlers mapping each endpoint onto one cache operation.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{AdvancedCache, CacheStats, CacheStatus, OptimizeReport};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, InvalidatePatternRequest, InvalidateResponse,
    InvalidateTagsRequest, RestoreRequest, SetRequest, SetResponse, SnapshotResponse,
};

/// Application state shared across all handlers.
///
/// `AdvancedCache` is already a cheap, cloneable handle with its own lock.
#[derive(Clone)]
pub struct AppState {
    pub cache: AdvancedCache,
}

impl AppState {
    /// Wraps an existing cache.
    pub fn new(cache: AdvancedCache) -> Self {
        Self { cache }
    }

    /// Builds a cache from configuration. Must run inside a Tokio runtime.
    pub fn from_config(config: CacheConfig) -> Self {
        Self::new(AdvancedCache::new(config))
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    if !state.cache.set(&req.key, &req.value, req.options).await {
        return Err(CacheError::Internal(format!(
            "Failed to store key '{}'",
            req.key
        )));
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get::<serde_json::Value>(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.remove(&key).await {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /invalidate/tags
pub async fn invalidate_tags_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateTagsRequest>,
) -> Json<InvalidateResponse> {
    let count = state.cache.invalidate_by_tags(&req.tags).await;
    Json(InvalidateResponse { count })
}

/// Handler for POST /invalidate/pattern
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidatePatternRequest>,
) -> Result<Json<InvalidateResponse>> {
    let pattern = req.compile().map_err(CacheError::InvalidRequest)?;
    let count = state.cache.invalidate_by_pattern(&pattern).await;
    Ok(Json(InvalidateResponse { count }))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let count = state.cache.clear().await;
    Json(InvalidateResponse { count })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.get_stats().await)
}

/// Handler for GET /status
pub async fn status_handler(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.cache.get_status().await)
}

/// Handler for POST /optimize
pub async fn optimize_handler(State(state): State<AppState>) -> Json<OptimizeReport> {
    Json(state.cache.optimize().await)
}

/// Handler for POST /backup
pub async fn backup_handler(State(state): State<AppState>) -> Result<Json<SnapshotResponse>> {
    let path = state.cache.backup().await?;
    Ok(Json(SnapshotResponse::backup(path)))
}

/// Handler for POST /restore
pub async fn restore_handler(
    State(state): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<SnapshotResponse>> {
    let path = req
        .resolve(&state.cache.config().persistence_path)
        .map_err(CacheError::InvalidRequest)?;
    state.cache.restore(&path).await?;
    Ok(Json(SnapshotResponse::restored(path)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.cache.get_status().await;
    Json(HealthResponse::from_health(status.healthy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SetOptions;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::from_config(CacheConfig {
            persistence_enabled: false,
            ..CacheConfig::default()
        })
    }

    fn set_request(key: &str, value: serde_json::Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            options: SetOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let result = set_handler(
            State(state.clone()),
            Json(set_request("test_key", json!({"a": [1, 2, 3]}))),
        )
        .await;
        assert!(result.is_ok());

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"a": [1, 2, 3]}));
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state();

        let result = get_handler(State(state.clone()), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        let stored =
            set_handler(State(state.clone()), Json(set_request("to_delete", json!("v")))).await;
        assert!(stored.is_ok());

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_invalid_pattern_rejected() {
        let state = test_state();

        let result = invalidate_pattern_handler(
            State(state.clone()),
            Json(InvalidatePatternRequest {
                pattern: "[".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_restore_rejects_path_outside_persistence_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let state = AppState::from_config(CacheConfig {
            persistence_enabled: false,
            persistence_path: dir.path().to_path_buf(),
            ..CacheConfig::default()
        });
        let foreign = outside.path().join("planted.json");

        for file in [
            foreign.to_string_lossy().into_owned(),
            "../planted.json".to_string(),
        ] {
            let result =
                restore_handler(State(state.clone()), Json(RestoreRequest { file })).await;
            assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        }
        assert_eq!(state.cache.get_stats().await.errors, 0);
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();

        let response = stats_handler(State(state.clone())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_health_handler() {
        let state = test_state();
        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status, "healthy");
        state.cache.close().await;
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let result = set_handler(State(state.clone()), Json(set_request("", json!(1)))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        state.cache.close().await;
    }
}
