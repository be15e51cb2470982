//! Per-vnode storage for RingStore.
//!
//! Every vnode owned by a process gets its own isolated store holding two
//! namespaces: a key/value map whose updates are gated by the
//! [`ContentHash`](ringstore_types::ContentHash) of the current value, and
//! an object (blob) map with unconditional writes.
//!
//! # Traits
//!
//! - [`VnodeStore`] -- synchronous, one instance per vnode
//! - [`VnodeStoreFactory`] -- creates a [`VnodeStore`] for a vnode at bring-up
//! - [`Store`] -- async, vnode-addressed capability shared by the router and
//!   the RPC transport
//!
//! # Backends
//!
//! - [`InMemoryVnodeStore`] -- `HashMap`-based reference backend
//! - [`FileVnodeStore`] -- durable backend, one directory per vnode
//!
//! # Design Rules
//!
//! 1. A value's content hash is always the digest of its current bytes.
//! 2. One exclusive lock per instance guards both namespaces.
//! 3. Snapshots are bincode encoded and zstd compressed; an empty store
//!    produces [`SnapshotOutcome::Empty`] and writes nothing.
//! 4. Restore is an additive merge: incoming entries win, absent keys are
//!    left untouched.
//! 5. Removing an absent entry succeeds.

pub mod error;
pub mod file;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileStoreFactory, FileVnodeStore};
pub use memory::{InMemoryStoreFactory, InMemoryVnodeStore};
pub use snapshot::{SnapshotData, SnapshotOutcome};
pub use traits::{Store, VnodeStore, VnodeStoreFactory};

/// Printable form of a key for errors and log lines.
pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
