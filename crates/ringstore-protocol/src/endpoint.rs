/// HTTP endpoint paths of a RingStore node.
pub mod endpoints {
    pub const KV: &str = "/kv";
    pub const OBJECT: &str = "/object";
    pub const LOOKUP: &str = "/lookup";
    pub const CONFIG: &str = "/config";
    pub const HEALTH: &str = "/health";
}

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
    pub local_vnodes: usize,
}

impl HealthResponse {
    pub fn ok(local_vnodes: usize) -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
            local_vnodes,
        }
    }
}
