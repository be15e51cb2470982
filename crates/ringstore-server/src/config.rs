use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Settings of one RingStore node.
///
/// Every field has a default, so a TOML file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Peer RPC listen address; also this node's identity on the ring.
    pub rpc_addr: String,
    pub http_addr: SocketAddr,
    /// RPC addresses of every ring member. `rpc_addr` is added if missing.
    pub members: Vec<String>,
    pub vnodes_per_host: usize,
    /// Replication factor of the ring. HTTP requests choose their own `n`
    /// (default 1); `ringstore lookup` uses this when `-n` is absent.
    pub replicas: usize,
    /// Per-call RPC deadline in milliseconds.
    pub rpc_timeout: u64,
    pub heal_on_inconsistent: bool,
    pub heal_queue_capacity: usize,
    /// Root of the file backend; in-memory stores when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_addr: "127.0.0.1:7000".into(),
            http_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            members: Vec::new(),
            vnodes_per_host: 8,
            replicas: 3,
            rpc_timeout: 10_000,
            heal_on_inconsistent: true,
            heal_queue_capacity: 1024,
            data_dir: None,
        }
    }
}

impl NodeConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.vnodes_per_host == 0 {
            return Err(ServerError::Config("vnodes_per_host must be at least 1".into()));
        }
        if self.replicas == 0 {
            return Err(ServerError::Config("replicas must be at least 1".into()));
        }
        if self.rpc_timeout == 0 {
            return Err(ServerError::Config("rpc_timeout must be positive".into()));
        }
        Ok(())
    }

    /// Ring membership as seen by a node advertising `local`.
    pub fn members_with(&self, local: &str) -> Vec<String> {
        let mut members = self.members.clone();
        if !members.iter().any(|m| m == local) {
            members.push(local.to_string());
        }
        members
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = NodeConfig::default();
        assert_eq!(c.rpc_addr, "127.0.0.1:7000");
        assert_eq!(c.http_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.replicas, 3);
        assert_eq!(c.rpc_timeout(), Duration::from_secs(10));
        assert!(c.heal_on_inconsistent);
        assert!(c.data_dir.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = NodeConfig::from_toml_str(
            r#"
            rpc_addr = "10.0.0.1:7000"
            members = ["10.0.0.1:7000", "10.0.0.2:7000"]
            replicas = 2
            data_dir = "/var/lib/ringstore"
            "#,
        )
        .unwrap();
        assert_eq!(c.rpc_addr, "10.0.0.1:7000");
        assert_eq!(c.members.len(), 2);
        assert_eq!(c.replicas, 2);
        assert_eq!(c.vnodes_per_host, 8);
        assert_eq!(c.data_dir, Some(PathBuf::from("/var/lib/ringstore")));
    }

    #[test]
    fn toml_round_trip() {
        let c = NodeConfig {
            members: vec!["a:1".into(), "b:1".into()],
            data_dir: Some("data".into()),
            ..NodeConfig::default()
        };
        let parsed = NodeConfig::from_toml_str(&c.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            NodeConfig::from_toml_str("replicas = 0"),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            NodeConfig::from_toml_str("vnodes_per_host = \"many\""),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn local_address_joins_membership() {
        let c = NodeConfig {
            members: vec!["b:1".into()],
            ..NodeConfig::default()
        };
        assert_eq!(c.members_with("a:1"), vec!["b:1".to_string(), "a:1".to_string()]);
        assert_eq!(c.members_with("b:1"), vec!["b:1".to_string()]);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "heal_on_inconsistent = false\n").unwrap();
        let c = NodeConfig::load(&path).unwrap();
        assert!(!c.heal_on_inconsistent);

        let missing = NodeConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ServerError::Config(_))));
    }
}
