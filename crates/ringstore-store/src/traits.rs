use std::io::{Read, Write};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ringstore_types::{ContentHash, ReplicaResult, VnodeRef};

use crate::error::StoreResult;
use crate::snapshot::SnapshotOutcome;

/// Storage for the namespaces of a single vnode.
///
/// All implementations must satisfy these invariants:
/// - `update_key` succeeds only if the digest of the current value equals
///   `prev_hash`; otherwise the value is left unchanged.
/// - The key/value and object namespaces are independent.
/// - `snapshot` of an empty store writes nothing and returns
///   [`SnapshotOutcome::Empty`].
/// - `restore` merges additively; incoming entries win on conflict.
/// - Removing an absent entry is not an error.
pub trait VnodeStore: Send + Sync {
    /// Read the current value of a key.
    fn get_key(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Write a value unconditionally.
    fn put_key(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Replace a value if `prev_hash` matches the digest of the current one.
    fn update_key(&self, prev_hash: &ContentHash, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Delete a key.
    fn remove_key(&self, key: &[u8]) -> StoreResult<()>;

    /// Read an object.
    fn get_object(&self, key: &[u8]) -> StoreResult<Bytes>;

    /// Write an object unconditionally.
    fn put_object(&self, key: &[u8], data: &[u8]) -> StoreResult<()>;

    /// Delete an object.
    fn remove_object(&self, key: &[u8]) -> StoreResult<()>;

    /// Serialize both namespaces into `sink` through a compressing stream.
    fn snapshot(&self, sink: &mut dyn Write) -> StoreResult<SnapshotOutcome>;

    /// Merge a snapshot produced by [`VnodeStore::snapshot`] into this store.
    ///
    /// Returns the number of entries merged.
    fn restore(&self, source: &mut dyn Read) -> StoreResult<usize>;
}

/// Creates the local store of each vnode this process owns.
pub trait VnodeStoreFactory: Send + Sync {
    fn open(&self, vnode: &VnodeRef) -> StoreResult<Arc<dyn VnodeStore>>;
}

/// Vnode-addressed storage capability.
///
/// Implemented by the router (which picks a local store or a remote peer)
/// and by the RPC transport. Errors are per-replica: they describe what
/// happened to this one vnode and never abort a fan-out.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_key(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<Vec<u8>>;

    async fn put_key(&self, vnode: &VnodeRef, key: &[u8], value: &[u8]) -> ReplicaResult<()>;

    async fn update_key(
        &self,
        vnode: &VnodeRef,
        prev_hash: &ContentHash,
        key: &[u8],
        value: &[u8],
    ) -> ReplicaResult<()>;

    async fn remove_key(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<()>;

    async fn get_object(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<Bytes>;

    async fn put_object(&self, vnode: &VnodeRef, key: &[u8], data: Bytes) -> ReplicaResult<()>;

    async fn remove_object(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<()>;

    /// Compressed snapshot of a vnode, or `None` if the vnode holds no data.
    async fn snapshot(&self, vnode: &VnodeRef) -> ReplicaResult<Option<Vec<u8>>>;

    /// Merge a snapshot into a vnode.
    async fn restore(&self, vnode: &VnodeRef, snapshot: &[u8]) -> ReplicaResult<()>;

    /// Release any resources held for remote access.
    async fn shutdown(&self) -> ReplicaResult<()>;
}
