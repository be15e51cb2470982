use ringstore_types::{ContentHash, ErrorCode, ReplicaError, VnodeRef};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Largest payload carried by a single [`RpcMessage::Chunk`].
pub const CHUNK_SIZE: usize = 64 * 1024;

/// An application error carried in a response.
///
/// The code preserves the [`ReplicaError`] kind across the wire; it is
/// distinct from a transport fault, which tears the exchange down instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: u16,
    pub message: String,
}

impl WireError {
    /// Rebuild the typed replica error. Unknown codes degrade to `Storage`.
    pub fn into_replica(self) -> ReplicaError {
        match ErrorCode::from_u16(self.code) {
            Ok(code) => ReplicaError::from_parts(code, self.message),
            Err(_) => ReplicaError::Storage(self.message),
        }
    }
}

impl From<&ReplicaError> for WireError {
    fn from(err: &ReplicaError) -> Self {
        Self {
            code: err.code().as_u16(),
            message: err.detail().to_string(),
        }
    }
}

/// All message types of the peer RPC protocol.
///
/// Unary calls are one request frame answered by one response frame.
/// Streams are a sequence of `Chunk` frames closed by `StreamEnd`:
///
/// - `PutObject` / `Restore`: header, client chunks, `StreamEnd`, then `Ack`
/// - `GetObject` / `Snapshot`: request, server chunks, `StreamEnd`
///
/// A stream of zero chunks closed without error means "no data".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMessage {
    PutKey { vnode: VnodeRef, key: Vec<u8>, value: Vec<u8> },
    GetKey { vnode: VnodeRef, key: Vec<u8> },
    UpdateKey { vnode: VnodeRef, prev_hash: ContentHash, key: Vec<u8>, value: Vec<u8> },
    RemoveKey { vnode: VnodeRef, key: Vec<u8> },
    RemoveObject { vnode: VnodeRef, key: Vec<u8> },
    PutObject { vnode: VnodeRef, key: Vec<u8> },
    GetObject { vnode: VnodeRef, key: Vec<u8> },
    Snapshot { vnode: VnodeRef },
    Restore { vnode: VnodeRef },
    Chunk { data: Vec<u8> },
    StreamEnd { error: Option<WireError> },
    Ack { error: Option<WireError> },
    Value { data: Option<Vec<u8>>, error: Option<WireError> },
    Fault { message: String },
}

impl RpcMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::PutKey { .. } => 1,
            Self::GetKey { .. } => 2,
            Self::UpdateKey { .. } => 3,
            Self::RemoveKey { .. } => 4,
            Self::RemoveObject { .. } => 5,
            Self::PutObject { .. } => 6,
            Self::GetObject { .. } => 7,
            Self::Snapshot { .. } => 8,
            Self::Restore { .. } => 9,
            Self::Chunk { .. } => 10,
            Self::StreamEnd { .. } => 11,
            Self::Ack { .. } => 12,
            Self::Value { .. } => 13,
            Self::Fault { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PutKey { .. } => "PutKey",
            Self::GetKey { .. } => "GetKey",
            Self::UpdateKey { .. } => "UpdateKey",
            Self::RemoveKey { .. } => "RemoveKey",
            Self::RemoveObject { .. } => "RemoveObject",
            Self::PutObject { .. } => "PutObject",
            Self::GetObject { .. } => "GetObject",
            Self::Snapshot { .. } => "Snapshot",
            Self::Restore { .. } => "Restore",
            Self::Chunk { .. } => "Chunk",
            Self::StreamEnd { .. } => "StreamEnd",
            Self::Ack { .. } => "Ack",
            Self::Value { .. } => "Value",
            Self::Fault { .. } => "Fault",
        }
    }

    /// Build an `Ack` from the outcome of a write.
    pub fn ack(result: Result<(), ReplicaError>) -> Self {
        Self::Ack {
            error: result.err().as_ref().map(WireError::from),
        }
    }

    /// Build a `Value` from the outcome of a read.
    pub fn value(result: Result<Vec<u8>, ReplicaError>) -> Self {
        match result {
            Ok(data) => Self::Value {
                data: Some(data),
                error: None,
            },
            Err(err) => Self::Value {
                data: None,
                error: Some(WireError::from(&err)),
            },
        }
    }
}
