//! RingStore node.
//!
//! Loads the node configuration, wires the replication core together
//! (ring, local stores, transport, router, coordinator, healing and
//! topology loops), serves peer RPC, and exposes the JSON HTTP API.
//!
//! Endpoints:
//!   GET/POST/PUT/DELETE /kv/:key?n=      key/value fan-out (PUT is the hash-gated update)
//!   GET/POST/DELETE     /object/:hex?n=  object fan-out, key hex encoded
//!   GET                 /lookup/:key?n=  replica set of a key
//!   GET                 /config          node configuration
//!   GET                 /health          liveness probe

pub mod config;
pub mod error;
pub mod handler;
pub mod node;
pub mod router;

pub use config::NodeConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use node::{RingStoreNode, RunningNode};
pub use router::build_router;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use ringstore_cluster::{Coordinator, Router as StoreRouter, StaticRing};
    use ringstore_store::InMemoryStoreFactory;
    use ringstore_transport::StoreTransport;
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;

    const HOST: &str = "127.0.0.1:7000";

    fn app() -> Router {
        let ring = Arc::new(StaticRing::new(&[HOST], 8));
        let store = StoreRouter::new(
            &InMemoryStoreFactory,
            ring.vnodes(),
            Arc::new(StoreTransport::default()),
        )
        .unwrap()
        .with_local_host(HOST);
        let coordinator = Arc::new(Coordinator::new(ring, Arc::new(store)));
        build_router(AppState::new(coordinator, NodeConfig::default(), 8))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: &[u8]) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body.to_vec()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn json(app: &Router, method: Method, uri: &str, body: &[u8]) -> Value {
        let (status, bytes) = call(app, method, uri, body).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));
        serde_json::from_slice(&bytes).unwrap()
    }

    fn data(results: &Value) -> Vec<Option<&str>> {
        results
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.get("data").and_then(Value::as_str))
            .collect()
    }

    // ----------------------------------------------------------------
    // /kv
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn kv_put_get_remove() {
        let app = app();
        let put = json(&app, Method::POST, "/kv/mytestkey?n=4", b"value").await;
        assert_eq!(put.as_array().unwrap().len(), 4);
        assert!(put[0].get("error").is_none());
        assert!(put[0]["vnode"]["id"].is_string());
        assert_eq!(put[0]["vnode"]["host"], HOST);

        let got = json(&app, Method::GET, "/kv/mytestkey?n=4", b"").await;
        assert_eq!(data(&got), vec![Some(hex::encode("value").as_str()); 4]);

        json(&app, Method::DELETE, "/kv/mytestkey?n=4", b"").await;
        let got = json(&app, Method::GET, "/kv/mytestkey?n=4", b"").await;
        for r in got.as_array().unwrap() {
            assert!(r["error"].as_str().unwrap().starts_with("not found"));
        }
    }

    #[tokio::test]
    async fn kv_put_is_an_update() {
        let app = app();
        json(&app, Method::POST, "/kv/k?n=3", b"old").await;
        let updated = json(&app, Method::PUT, "/kv/k?n=3", b"new").await;
        assert!(updated
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r.get("error").is_none()));
        let got = json(&app, Method::GET, "/kv/k?n=3", b"").await;
        assert_eq!(data(&got), vec![Some(hex::encode("new").as_str()); 3]);

        let absent = json(&app, Method::PUT, "/kv/never-written?n=2", b"x").await;
        assert!(absent
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["error"].as_str().is_some_and(|e| e.starts_with("not found"))));
    }

    #[tokio::test]
    async fn missing_or_bad_n_means_one() {
        let app = app();
        let put = json(&app, Method::POST, "/kv/k", b"v").await;
        assert_eq!(put.as_array().unwrap().len(), 1);
        let got = json(&app, Method::GET, "/kv/k?n=lots", b"").await;
        assert_eq!(got.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn coordinator_errors_are_plain_text_400() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/kv/k?n=9", b"").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("ring lookup failed"));
    }

    // ----------------------------------------------------------------
    // /object
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn object_roundtrip_with_hex_key() {
        let app = app();
        let key = hex::encode("blob");
        json(&app, Method::POST, &format!("/object/{key}?n=2"), b"payload").await;
        let got = json(&app, Method::GET, &format!("/object/{key}?n=2"), b"").await;
        assert_eq!(data(&got), vec![Some(hex::encode("payload").as_str()); 2]);

        json(&app, Method::DELETE, &format!("/object/{key}?n=2"), b"").await;
        let got = json(&app, Method::GET, &format!("/object/{key}?n=2"), b"").await;
        assert_eq!(data(&got), vec![None, None]);
    }

    #[tokio::test]
    async fn non_hex_object_key_is_rejected() {
        let app = app();
        let (status, _) = call(&app, Method::GET, "/object/not-hex", b"").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ----------------------------------------------------------------
    // /lookup, /config, /health
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn lookup_lists_vnodes() {
        let app = app();
        let vnodes = json(&app, Method::GET, "/lookup/mytestkey?n=3", b"").await;
        let vnodes = vnodes.as_array().unwrap();
        assert_eq!(vnodes.len(), 3);
        assert!(vnodes.iter().all(|v| v["host"] == HOST));
    }

    #[tokio::test]
    async fn config_endpoint() {
        let app = app();
        let config = json(&app, Method::GET, "/config", b"").await;
        assert_eq!(config["replicas"], 3);
        assert_eq!(config["rpc_addr"], "127.0.0.1:7000");
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = app();
        let health = json(&app, Method::GET, "/health", b"").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["local_vnodes"], 8);
    }
}
