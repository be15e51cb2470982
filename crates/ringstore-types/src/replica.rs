use std::io::Cursor;

use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::error::TypeError;
use crate::vnode::VnodeRef;

/// Wire code preserving the kind of a [`ReplicaError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    NotFound = 1,
    HashMismatch = 2,
    TransportUnavailable = 3,
    TransportShutdown = 4,
    Storage = 5,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Result<Self, TypeError> {
        match code {
            1 => Ok(Self::NotFound),
            2 => Ok(Self::HashMismatch),
            3 => Ok(Self::TransportUnavailable),
            4 => Ok(Self::TransportShutdown),
            5 => Ok(Self::Storage),
            other => Err(TypeError::UnknownErrorCode(other)),
        }
    }
}

/// Failure of a single replica operation.
///
/// Replica errors are captured per vnode and never abort a fan-out. They
/// keep their kind across the RPC boundary, so a remote replica reports the
/// same variant as a local one would.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReplicaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("transport is shut down")]
    TransportShutdown,

    #[error("storage error: {0}")]
    Storage(String),
}

impl ReplicaError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::HashMismatch(_) => ErrorCode::HashMismatch,
            Self::TransportUnavailable(_) => ErrorCode::TransportUnavailable,
            Self::TransportShutdown => ErrorCode::TransportShutdown,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }

    /// The message carried by the error, without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::HashMismatch(m)
            | Self::TransportUnavailable(m)
            | Self::Storage(m) => m,
            Self::TransportShutdown => "",
        }
    }

    /// Rebuild an error from its wire code and detail.
    pub fn from_parts(code: ErrorCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match code {
            ErrorCode::NotFound => Self::NotFound(detail),
            ErrorCode::HashMismatch => Self::HashMismatch(detail),
            ErrorCode::TransportUnavailable => Self::TransportUnavailable(detail),
            ErrorCode::TransportShutdown => Self::TransportShutdown,
            ErrorCode::Storage => Self::Storage(detail),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, Self::HashMismatch(_))
    }
}

pub type ReplicaResult<T> = Result<T, ReplicaError>;

/// Outcome of one operation against one replica.
///
/// A fan-out returns exactly one `VnodeResult` per vnode from the ring
/// lookup, in lookup order. Exactly one of `data` or `error` is set for
/// reads; writes leave `data` empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VnodeResult<T> {
    pub vnode: VnodeRef,
    pub data: Option<T>,
    pub error: Option<ReplicaError>,
}

/// Per-replica result of a key/value read.
pub type KeyResult = VnodeResult<Vec<u8>>;

/// Per-replica result of an object read.
pub type ObjectResult = VnodeResult<Bytes>;

/// Per-replica result of a write or delete.
pub type WriteResult = VnodeResult<()>;

impl<T> VnodeResult<T> {
    pub fn from_result(vnode: VnodeRef, result: ReplicaResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                vnode,
                data: Some(data),
                error: None,
            },
            Err(err) => Self::failed(vnode, err),
        }
    }

    pub fn failed(vnode: VnodeRef, error: ReplicaError) -> Self {
        Self {
            vnode,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl WriteResult {
    /// Collapse a write outcome; a successful write carries no payload.
    pub fn from_write(vnode: VnodeRef, result: ReplicaResult<()>) -> Self {
        Self {
            vnode,
            data: None,
            error: result.err(),
        }
    }
}

impl ObjectResult {
    /// A readable handle over the object content, if the read succeeded.
    pub fn reader(&self) -> Option<Cursor<Bytes>> {
        self.data.clone().map(Cursor::new)
    }
}

/// Payloads that can appear in the JSON form of a [`VnodeResult`].
pub trait ResultPayload {
    fn to_hex(&self) -> String;
}

impl ResultPayload for Vec<u8> {
    fn to_hex(&self) -> String {
        hex::encode(self)
    }
}

impl ResultPayload for Bytes {
    fn to_hex(&self) -> String {
        hex::encode(self)
    }
}

impl ResultPayload for () {
    fn to_hex(&self) -> String {
        String::new()
    }
}

// JSON form: {"vnode": {"id", "host"}, "data"?: hex, "error"?: string}
impl<T: ResultPayload> Serialize for VnodeResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + usize::from(self.data.is_some()) + usize::from(self.error.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("vnode", &self.vnode)?;
        if let Some(data) = &self.data {
            map.serialize_entry("data", &data.to_hex())?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", &error.to_string())?;
        }
        map.end()
    }
}

/// A key on a vnode whose replicas need repair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealRequest {
    pub vnode: VnodeRef,
    pub key: Vec<u8>,
}

impl HealRequest {
    pub fn new(vnode: VnodeRef, key: impl Into<Vec<u8>>) -> Self {
        Self {
            vnode,
            key: key.into(),
        }
    }
}
