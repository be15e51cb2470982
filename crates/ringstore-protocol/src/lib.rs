//! Wire protocol for RingStore.
//!
//! Defines the framing, message types, and serialization format used between
//! peers when one node forwards a per-vnode storage operation to the node
//! that owns the vnode, plus the HTTP paths of the node's public surface.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::RpcCodec;
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{read_message, read_stream, write_message, write_stream};
pub use message::{RpcMessage, WireError, CHUNK_SIZE, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
