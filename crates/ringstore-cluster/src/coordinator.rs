use std::sync::Arc;

use bytes::Bytes;
use ringstore_crypto::ContentHasher;
use ringstore_store::Store;
use ringstore_types::{
    ContentHash, HealRequest, KeyResult, ObjectResult, ReplicaError, VnodeRef, VnodeResult,
    WriteResult,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::heal::HealQueue;
use crate::ring::Ring;

/// Turns one logical operation into one operation per replica.
///
/// Every call resolves the replica set through the ring, then visits the
/// replicas sequentially in lookup order through the [`Store`] (normally a
/// [`Router`](crate::Router)). The result list always has one entry per
/// vnode returned by the lookup; per-replica failures are reported in their
/// entry and never abort the fan-out.
pub struct Coordinator {
    ring: Arc<dyn Ring>,
    store: Arc<dyn Store>,
    heal_queue: Option<HealQueue>,
}

impl Coordinator {
    pub fn new(ring: Arc<dyn Ring>, store: Arc<dyn Store>) -> Self {
        Self {
            ring,
            store,
            heal_queue: None,
        }
    }

    /// Enqueue a repair for the first diverging replica whenever an update
    /// finds the replicas inconsistent.
    pub fn with_heal_queue(mut self, queue: HealQueue) -> Self {
        self.heal_queue = Some(queue);
        self
    }

    /// The store replica operations are routed through.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The `n` vnodes currently responsible for `key`, in ring order.
    pub async fn lookup(&self, n: usize, key: &[u8]) -> ClusterResult<Vec<VnodeRef>> {
        let vnodes = self.ring.lookup(n, key).await?;
        debug!(key = %display_key(key), n, resolved = vnodes.len(), "ring lookup");
        Ok(vnodes)
    }

    pub async fn get_key(&self, n: usize, key: &[u8]) -> ClusterResult<Vec<KeyResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.get_key(&vnode, key).await;
            results.push(VnodeResult::from_result(vnode, result));
        }
        Ok(results)
    }

    pub async fn put_key(&self, n: usize, key: &[u8], value: &[u8]) -> ClusterResult<Vec<WriteResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.put_key(&vnode, key, value).await;
            results.push(VnodeResult::from_write(vnode, result));
        }
        Ok(results)
    }

    /// Read every replica, then write `value` gated on the hash they agree on.
    ///
    /// Fails with [`ClusterError::Inconsistent`] without writing anything if
    /// two replicas disagree. A replica whose read failed counts as absent.
    /// If no replica holds the key, the read errors are returned as they
    /// are and nothing is written.
    pub async fn update_key(
        &self,
        n: usize,
        key: &[u8],
        value: &[u8],
    ) -> ClusterResult<Vec<WriteResult>> {
        let current = self.get_key(n, key).await?;

        let hashes: Vec<Option<ContentHash>> = current
            .iter()
            .map(|r| r.data.as_deref().map(|v| ContentHasher::VALUE.hash(v)))
            .collect();
        let Some(first) = hashes.first().copied() else {
            return Ok(Vec::new());
        };

        if let Some(pos) = hashes.iter().position(|h| *h != first) {
            let diverging = current[pos].vnode.clone();
            self.request_heal(&diverging, key);
            return Err(ClusterError::Inconsistent {
                key: display_key(key),
                first: display_hash(first),
                second: display_hash(hashes[pos]),
            });
        }

        let Some(agreed) = first else {
            debug!(key = %display_key(key), "update of a key no replica holds");
            return Ok(current
                .into_iter()
                .map(|r| {
                    let error = r
                        .error
                        .unwrap_or_else(|| ReplicaError::NotFound(display_key(key)));
                    VnodeResult::failed(r.vnode, error)
                })
                .collect());
        };

        let mut results = Vec::with_capacity(current.len());
        for replica in current {
            let result = self.store.update_key(&replica.vnode, &agreed, key, value).await;
            results.push(VnodeResult::from_write(replica.vnode, result));
        }
        Ok(results)
    }

    /// Hash-gated write with a caller-supplied expected hash, no pre-read.
    pub async fn update_key_with_hash(
        &self,
        n: usize,
        key: &[u8],
        prev_hash: &ContentHash,
        value: &[u8],
    ) -> ClusterResult<Vec<WriteResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.update_key(&vnode, prev_hash, key, value).await;
            results.push(VnodeResult::from_write(vnode, result));
        }
        Ok(results)
    }

    pub async fn remove_key(&self, n: usize, key: &[u8]) -> ClusterResult<Vec<WriteResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.remove_key(&vnode, key).await;
            results.push(VnodeResult::from_write(vnode, result));
        }
        Ok(results)
    }

    /// Read an object from every replica; each successful entry exposes a
    /// reader through [`ObjectResult::reader`].
    pub async fn get_object(&self, n: usize, key: &[u8]) -> ClusterResult<Vec<ObjectResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.get_object(&vnode, key).await;
            results.push(VnodeResult::from_result(vnode, result));
        }
        Ok(results)
    }

    /// Buffer `source` once and write the same bytes to every replica.
    pub async fn put_object<R>(
        &self,
        n: usize,
        key: &[u8],
        mut source: R,
    ) -> ClusterResult<Vec<WriteResult>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).await?;
        self.put_object_bytes(n, key, Bytes::from(buf)).await
    }

    pub async fn put_object_bytes(
        &self,
        n: usize,
        key: &[u8],
        data: Bytes,
    ) -> ClusterResult<Vec<WriteResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.put_object(&vnode, key, data.clone()).await;
            results.push(VnodeResult::from_write(vnode, result));
        }
        Ok(results)
    }

    pub async fn remove_object(&self, n: usize, key: &[u8]) -> ClusterResult<Vec<WriteResult>> {
        let vnodes = self.lookup(n, key).await?;
        let mut results = Vec::with_capacity(vnodes.len());
        for vnode in vnodes {
            let result = self.store.remove_object(&vnode, key).await;
            results.push(VnodeResult::from_write(vnode, result));
        }
        Ok(results)
    }

    /// Tear down the router and, through it, the transport.
    pub async fn shutdown(&self) -> ClusterResult<()> {
        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "store shutdown reported an error");
        }
        info!("coordinator shut down");
        Ok(())
    }

    fn request_heal(&self, vnode: &VnodeRef, key: &[u8]) {
        let Some(queue) = &self.heal_queue else {
            return;
        };
        let request = HealRequest::new(vnode.clone(), key.to_vec());
        if queue.try_enqueue(request) {
            info!(key = %display_key(key), vnode = %vnode.short_id(), "queued repair");
        } else {
            warn!(key = %display_key(key), vnode = %vnode.short_id(), "heal queue full or closed, repair dropped");
        }
    }
}

pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

fn display_hash(hash: Option<ContentHash>) -> String {
    hash.map_or_else(|| "absent".to_string(), |h| h.short_hex())
}
