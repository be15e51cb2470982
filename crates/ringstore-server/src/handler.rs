use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use bytes::Bytes;
use ringstore_cluster::Coordinator;
use ringstore_protocol::HealthResponse;
use ringstore_types::{KeyResult, ObjectResult, VnodeRef, WriteResult};
use serde::Deserialize;

use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};

/// State shared by every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<NodeConfig>,
    pub local_vnodes: usize,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, config: NodeConfig, local_vnodes: usize) -> Self {
        Self {
            coordinator,
            config: Arc::new(config),
            local_vnodes,
        }
    }
}

/// `?n=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct ReplicaParams {
    n: Option<String>,
}

impl ReplicaParams {
    /// Requested replica count; 1 when absent or unparsable.
    pub fn count(&self) -> usize {
        self.n
            .as_deref()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(1)
    }
}

fn object_key(hex_key: &str) -> ServerResult<Vec<u8>> {
    hex::decode(hex_key).map_err(|e| ServerError::BadRequest(format!("invalid object key: {e}")))
}

// GET /kv/:key
pub async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ReplicaParams>,
) -> ServerResult<Json<Vec<KeyResult>>> {
    let results = state
        .coordinator
        .get_key(params.count(), key.as_bytes())
        .await?;
    Ok(Json(results))
}

// POST /kv/:key
pub async fn put_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ReplicaParams>,
    body: Bytes,
) -> ServerResult<Json<Vec<WriteResult>>> {
    let results = state
        .coordinator
        .put_key(params.count(), key.as_bytes(), &body)
        .await?;
    Ok(Json(results))
}

// PUT /kv/:key
pub async fn update_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ReplicaParams>,
    body: Bytes,
) -> ServerResult<Json<Vec<WriteResult>>> {
    let results = state
        .coordinator
        .update_key(params.count(), key.as_bytes(), &body)
        .await?;
    Ok(Json(results))
}

// DELETE /kv/:key
pub async fn remove_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ReplicaParams>,
) -> ServerResult<Json<Vec<WriteResult>>> {
    let results = state
        .coordinator
        .remove_key(params.count(), key.as_bytes())
        .await?;
    Ok(Json(results))
}

// GET /object/:hex
pub async fn get_object(
    State(state): State<AppState>,
    Path(hex_key): Path<String>,
    Query(params): Query<ReplicaParams>,
) -> ServerResult<Json<Vec<ObjectResult>>> {
    let key = object_key(&hex_key)?;
    let results = state.coordinator.get_object(params.count(), &key).await?;
    Ok(Json(results))
}

// POST /object/:hex
pub async fn put_object(
    State(state): State<AppState>,
    Path(hex_key): Path<String>,
    Query(params): Query<ReplicaParams>,
    body: Bytes,
) -> ServerResult<Json<Vec<WriteResult>>> {
    let key = object_key(&hex_key)?;
    let results = state
        .coordinator
        .put_object_bytes(params.count(), &key, body)
        .await?;
    Ok(Json(results))
}

// DELETE /object/:hex
pub async fn remove_object(
    State(state): State<AppState>,
    Path(hex_key): Path<String>,
    Query(params): Query<ReplicaParams>,
) -> ServerResult<Json<Vec<WriteResult>>> {
    let key = object_key(&hex_key)?;
    let results = state.coordinator.remove_object(params.count(), &key).await?;
    Ok(Json(results))
}

// GET /lookup/:key
pub async fn lookup(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ReplicaParams>,
) -> ServerResult<Json<Vec<VnodeRef>>> {
    let vnodes = state
        .coordinator
        .lookup(params.count(), key.as_bytes())
        .await?;
    Ok(Json(vnodes))
}

// GET /config
pub async fn config(State(state): State<AppState>) -> Json<NodeConfig> {
    Json(state.config.as_ref().clone())
}

// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.local_vnodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n: Option<&str>) -> ReplicaParams {
        ReplicaParams {
            n: n.map(str::to_string),
        }
    }

    #[test]
    fn replica_count_defaults_to_one() {
        assert_eq!(params(None).count(), 1);
        assert_eq!(params(Some("abc")).count(), 1);
        assert_eq!(params(Some("-2")).count(), 1);
        assert_eq!(params(Some("4")).count(), 4);
        assert_eq!(params(Some("0")).count(), 0);
    }

    #[test]
    fn object_keys_are_hex() {
        assert_eq!(object_key("6b6579").unwrap(), b"key");
        assert!(matches!(object_key("xyz"), Err(ServerError::BadRequest(_))));
    }
}
