//! Foundation types for RingStore.
//!
//! Every other RingStore crate depends on `ringstore-types`. The types here
//! describe *where* data lives on the ring and *what happened* when a single
//! replica was touched; they carry no storage or networking behaviour.
//!
//! # Key Types
//!
//! - [`VnodeRef`] — Ring position plus the address of the host that owns it
//! - [`ContentHash`] — 32-byte digest of a value, the optimistic-concurrency token
//! - [`ReplicaError`] — Typed failure of one replica, preserved across the wire
//! - [`VnodeResult`] — Outcome of one operation against one replica
//! - [`HealRequest`] — A key on a vnode that needs repair

pub mod error;
pub mod hash;
pub mod replica;
pub mod vnode;

pub use error::TypeError;
pub use hash::ContentHash;
pub use replica::{
    ErrorCode, HealRequest, KeyResult, ObjectResult, ReplicaError, ReplicaResult, ResultPayload,
    VnodeResult, WriteResult,
};
pub use vnode::VnodeRef;
