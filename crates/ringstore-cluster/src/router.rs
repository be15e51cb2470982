use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ringstore_store::{SnapshotOutcome, Store, StoreResult, VnodeStore, VnodeStoreFactory};
use ringstore_types::{ContentHash, ReplicaError, ReplicaResult, VnodeRef};
use tracing::{debug, info};

/// Location-transparent [`Store`].
///
/// Calls for a vnode this process owns go to its local store; everything
/// else is forwarded to the remote store (the RPC transport), addressed by
/// the vnode's host.
///
/// Local calls run on tokio's blocking pool and never hold a router lock.
///
/// The local mapping is filled once at construction and never changes. A
/// vnode that migrates to or from this process after bring-up is therefore
/// routed by its stale placement until the router is rebuilt.
pub struct Router {
    local: HashMap<Vec<u8>, Arc<dyn VnodeStore>>,
    remote: Arc<dyn Store>,
    local_host: Option<String>,
}

impl Router {
    /// Open a local store for each of `local_vnodes` and route the rest to
    /// `remote`.
    pub fn new(
        factory: &dyn VnodeStoreFactory,
        local_vnodes: &[VnodeRef],
        remote: Arc<dyn Store>,
    ) -> StoreResult<Self> {
        let mut local = HashMap::with_capacity(local_vnodes.len());
        for vnode in local_vnodes {
            local.insert(vnode.id.clone(), factory.open(vnode)?);
        }
        info!(local_vnodes = local.len(), "router initialised");
        Ok(Self {
            local,
            remote,
            local_host: None,
        })
    }

    /// Declare the address this process serves RPC on.
    ///
    /// A call for an unknown vnode claiming this host is refused instead of
    /// being forwarded back to ourselves.
    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = Some(host.into());
        self
    }

    pub fn local_vnode_count(&self) -> usize {
        self.local.len()
    }

    pub fn is_local(&self, vnode: &VnodeRef) -> bool {
        self.local.contains_key(&vnode.id)
    }

    /// The local store for `vnode`, `None` if the call must go remote.
    fn local_store(&self, vnode: &VnodeRef) -> ReplicaResult<Option<&Arc<dyn VnodeStore>>> {
        if let Some(store) = self.local.get(&vnode.id) {
            return Ok(Some(store));
        }
        if self.local_host.as_deref() == Some(vnode.host.as_str()) {
            return Err(ReplicaError::Storage(format!(
                "vnode {} is not hosted by this node",
                vnode.short_id()
            )));
        }
        debug!(vnode = %vnode.short_id(), "routing to remote");
        Ok(None)
    }
}

/// Run a call against a local store on the blocking pool.
///
/// Backends may touch the disk; the async workers stay free for RPC and HTTP.
async fn on_blocking_pool<T, F>(store: &Arc<dyn VnodeStore>, op: F) -> ReplicaResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn VnodeStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| ReplicaError::Storage(format!("local store task failed: {e}")))?
        .map_err(ReplicaError::from)
}

#[async_trait]
impl Store for Router {
    async fn get_key(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<Vec<u8>> {
        match self.local_store(vnode)? {
            Some(store) => {
                let key = key.to_vec();
                on_blocking_pool(store, move |s| s.get_key(&key)).await
            }
            None => self.remote.get_key(vnode, key).await,
        }
    }

    async fn put_key(&self, vnode: &VnodeRef, key: &[u8], value: &[u8]) -> ReplicaResult<()> {
        match self.local_store(vnode)? {
            Some(store) => {
                let (key, value) = (key.to_vec(), value.to_vec());
                on_blocking_pool(store, move |s| s.put_key(&key, &value)).await
            }
            None => self.remote.put_key(vnode, key, value).await,
        }
    }

    async fn update_key(
        &self,
        vnode: &VnodeRef,
        prev_hash: &ContentHash,
        key: &[u8],
        value: &[u8],
    ) -> ReplicaResult<()> {
        match self.local_store(vnode)? {
            Some(store) => {
                let (prev_hash, key, value) = (*prev_hash, key.to_vec(), value.to_vec());
                on_blocking_pool(store, move |s| s.update_key(&prev_hash, &key, &value)).await
            }
            None => self.remote.update_key(vnode, prev_hash, key, value).await,
        }
    }

    async fn remove_key(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<()> {
        match self.local_store(vnode)? {
            Some(store) => {
                let key = key.to_vec();
                on_blocking_pool(store, move |s| s.remove_key(&key)).await
            }
            None => self.remote.remove_key(vnode, key).await,
        }
    }

    async fn get_object(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<Bytes> {
        match self.local_store(vnode)? {
            Some(store) => {
                let key = key.to_vec();
                on_blocking_pool(store, move |s| s.get_object(&key)).await
            }
            None => self.remote.get_object(vnode, key).await,
        }
    }

    async fn put_object(&self, vnode: &VnodeRef, key: &[u8], data: Bytes) -> ReplicaResult<()> {
        match self.local_store(vnode)? {
            Some(store) => {
                let key = key.to_vec();
                on_blocking_pool(store, move |s| s.put_object(&key, &data)).await
            }
            None => self.remote.put_object(vnode, key, data).await,
        }
    }

    async fn remove_object(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<()> {
        match self.local_store(vnode)? {
            Some(store) => {
                let key = key.to_vec();
                on_blocking_pool(store, move |s| s.remove_object(&key)).await
            }
            None => self.remote.remove_object(vnode, key).await,
        }
    }

    async fn snapshot(&self, vnode: &VnodeRef) -> ReplicaResult<Option<Vec<u8>>> {
        match self.local_store(vnode)? {
            Some(store) => {
                on_blocking_pool(store, |s| {
                    let mut buf = Vec::new();
                    Ok(match s.snapshot(&mut buf)? {
                        SnapshotOutcome::Empty => None,
                        SnapshotOutcome::Written { .. } => Some(buf),
                    })
                })
                .await
            }
            None => self.remote.snapshot(vnode).await,
        }
    }

    async fn restore(&self, vnode: &VnodeRef, snapshot: &[u8]) -> ReplicaResult<()> {
        match self.local_store(vnode)? {
            Some(store) => {
                let snapshot = snapshot.to_vec();
                let merged =
                    on_blocking_pool(store, move |s| s.restore(&mut snapshot.as_slice())).await?;
                debug!(vnode = %vnode.short_id(), merged, "restored local vnode");
                Ok(())
            }
            None => self.remote.restore(vnode, snapshot).await,
        }
    }

    /// Tears down the remote transport; local stores live until drop.
    async fn shutdown(&self) -> ReplicaResult<()> {
        self.remote.shutdown().await
    }
}
