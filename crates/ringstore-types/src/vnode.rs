use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A position on the consistent-hash ring and the host that owns it.
///
/// `VnodeRef`s are handed out by the ring; RingStore never invents or
/// mutates them. The `id` is the raw ring position, the `host` is the RPC
/// address of the owning process.
///
/// In human-readable formats (JSON) the id is hex-encoded; binary formats
/// carry the raw bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VnodeRef {
    #[serde(with = "id_encoding")]
    pub id: Vec<u8>,
    pub host: String,
}

impl VnodeRef {
    pub fn new(id: impl Into<Vec<u8>>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
        }
    }

    /// Parse a vnode from a hex-encoded ring position.
    pub fn from_hex(id: &str, host: impl Into<String>) -> Result<Self, TypeError> {
        let id = hex::decode(id).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if id.is_empty() {
            return Err(TypeError::InvalidVnode("empty ring position".into()));
        }
        Ok(Self::new(id, host))
    }

    /// Stable string identity of the ring position (hex).
    ///
    /// Two refs with the same `string_id` name the same vnode, whatever
    /// host they were obtained from.
    pub fn string_id(&self) -> String {
        hex::encode(&self.id)
    }

    /// Short form for log lines: the first 4 id bytes and the host.
    pub fn short_id(&self) -> String {
        let end = self.id.len().min(4);
        format!("{}@{}", hex::encode(&self.id[..end]), self.host)
    }
}

impl fmt::Debug for VnodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VnodeRef({})", self.short_id())
    }
}

impl fmt::Display for VnodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.string_id(), self.host)
    }
}

mod id_encoding {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(id))
        } else {
            serializer.serialize_bytes(id)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(D::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}
