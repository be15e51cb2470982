//! Background repair of diverging replicas (runs in its own tokio task).

use std::future::Future;
use std::sync::Arc;

use ringstore_crypto::ContentHasher;
use ringstore_types::{HealRequest, ReplicaError, VnodeRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::{display_key, Coordinator};
use crate::error::{ClusterError, ClusterResult};

/// Replication factor a repair reads with.
pub const HEAL_REPLICAS: usize = 3;

/// Cloneable handle feeding the healing engine.
#[derive(Clone, Debug)]
pub struct HealQueue {
    tx: mpsc::Sender<HealRequest>,
}

impl HealQueue {
    /// Enqueue without waiting. Returns `false` if the queue is full or the
    /// engine has stopped.
    pub fn try_enqueue(&self, request: HealRequest) -> bool {
        self.tx.try_send(request).is_ok()
    }

    /// Enqueue, waiting for space. Returns `false` if the engine has stopped.
    pub async fn enqueue(&self, request: HealRequest) -> bool {
        self.tx.send(request).await.is_ok()
    }
}

/// Create a bounded heal queue and the receiver the engine consumes.
pub fn heal_queue(capacity: usize) -> (HealQueue, mpsc::Receiver<HealRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (HealQueue { tx }, rx)
}

/// Outcome of repairing one key.
#[derive(Debug)]
pub struct HealReport {
    pub key: Vec<u8>,
    /// Replica whose value was copied.
    pub source: VnodeRef,
    pub repaired: Vec<VnodeRef>,
    /// Replicas the repair write did not reach.
    pub failed: Vec<(VnodeRef, ReplicaError)>,
}

impl HealReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Single-worker repair loop.
///
/// Requests are processed strictly one at a time. Repair reads the key from
/// [`HEAL_REPLICAS`] replicas and, if every replica that answered agrees,
/// writes that value into the replicas that failed.
pub struct HealingEngine {
    coordinator: Arc<Coordinator>,
    requests: mpsc::Receiver<HealRequest>,
}

impl HealingEngine {
    pub fn new(coordinator: Arc<Coordinator>, requests: mpsc::Receiver<HealRequest>) -> Self {
        Self {
            coordinator,
            requests,
        }
    }

    /// Repair one key.
    pub async fn heal_key(&self, request: &HealRequest) -> ClusterResult<HealReport> {
        heal_key(&self.coordinator, request).await
    }

    /// Process requests until `stop` resolves or every queue handle is gone.
    ///
    /// On stop the queue is closed and whatever is still buffered is
    /// discarded. Returns the number of requests handled.
    pub async fn run<S>(mut self, stop: S) -> usize
    where
        S: Future<Output = ()> + Send,
    {
        tokio::pin!(stop);
        let mut handled = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    self.requests.close();
                    let mut discarded = 0;
                    while self.requests.try_recv().is_ok() {
                        discarded += 1;
                    }
                    info!(handled, discarded, "healing engine stopped");
                    break;
                }
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        debug!(handled, "heal queue closed");
                        break;
                    };
                    handled += 1;
                    if let Err(e) = heal_key(&self.coordinator, &request).await {
                        warn!(
                            key = %display_key(&request.key),
                            vnode = %request.vnode.short_id(),
                            error = %e,
                            "repair failed"
                        );
                    }
                }
            }
        }
        handled
    }
}

/// Repair `request.key` from the replicas that still hold it.
///
/// Fails with [`ClusterError::Exhausted`] if no replica could be read and
/// with [`ClusterError::Inconsistent`] if two readable replicas disagree.
pub async fn heal_key(coordinator: &Coordinator, request: &HealRequest) -> ClusterResult<HealReport> {
    let key = request.key.as_slice();
    let results = coordinator.get_key(HEAL_REPLICAS, key).await?;

    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result.data {
            Some(value) => ok.push((result.vnode, value)),
            None => failed.push(result.vnode),
        }
    }

    let Some((source, value)) = ok.first() else {
        return Err(ClusterError::Exhausted {
            key: display_key(key),
        });
    };
    let agreed = ContentHasher::VALUE.hash(value);
    for (_, other) in &ok[1..] {
        let hash = ContentHasher::VALUE.hash(other);
        if hash != agreed {
            return Err(ClusterError::Inconsistent {
                key: display_key(key),
                first: agreed.short_hex(),
                second: hash.short_hex(),
            });
        }
    }

    let mut report = HealReport {
        key: key.to_vec(),
        source: source.clone(),
        repaired: Vec::new(),
        failed: Vec::new(),
    };
    for target in failed {
        match coordinator.store().put_key(&target, key, value).await {
            Ok(()) => {
                info!(
                    key = %display_key(key),
                    from = %source.short_id(),
                    to = %target.short_id(),
                    "repaired replica"
                );
                report.repaired.push(target);
            }
            Err(e) => {
                warn!(
                    key = %display_key(key),
                    to = %target.short_id(),
                    error = %e,
                    "repair write failed"
                );
                report.failed.push((target, e));
            }
        }
    }
    Ok(report)
}
