//! Topology delegate (runs in its own tokio task).
//!
//! The ring reports membership changes through [`TopologyEvents`]; the
//! delegate consumes them in order and moves vnode data through the router.

use std::sync::Arc;

use ringstore_store::Store;
use ringstore_types::{ReplicaError, VnodeRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Ring membership change affecting a local vnode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyEvent {
    /// A vnode joined directly before `local`.
    NewPredecessor {
        local: VnodeRef,
        new_pred: VnodeRef,
        old_pred: Option<VnodeRef>,
    },
    /// `local` is about to leave the ring.
    Leaving {
        local: VnodeRef,
        pred: Option<VnodeRef>,
        succ: Option<VnodeRef>,
    },
    PredecessorLeaving { local: VnodeRef, remote: VnodeRef },
    SuccessorLeaving { local: VnodeRef, remote: VnodeRef },
    /// The ring is shutting down; stops the delegate.
    Shutdown,
}

/// Result of one snapshot transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The source vnode held no data.
    Skipped,
    Transferred { bytes: usize },
    Failed(ReplicaError),
}

/// Cloneable, non-blocking sender of topology events.
#[derive(Clone, Debug)]
pub struct TopologyEvents {
    tx: mpsc::UnboundedSender<TopologyEvent>,
}

impl TopologyEvents {
    /// Queue an event. Returns `false` if the delegate has stopped.
    pub fn send(&self, event: TopologyEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Create a delegate acting through `store` and the handle that feeds it.
pub fn create_topology_delegate(store: Arc<dyn Store>) -> (TopologyDelegate, TopologyEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TopologyDelegate { store, events: rx }, TopologyEvents { tx })
}

/// Reacts to ring membership changes by migrating vnode snapshots.
///
/// Transfer failures are logged and dropped; nothing is retried.
pub struct TopologyDelegate {
    store: Arc<dyn Store>,
    events: mpsc::UnboundedReceiver<TopologyEvent>,
}

impl TopologyDelegate {
    /// Run until a [`TopologyEvent::Shutdown`] arrives or every handle is
    /// dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            if event == TopologyEvent::Shutdown {
                info!("ring shutting down, topology delegate stopping");
                return;
            }
            self.handle(event).await;
        }
        debug!("topology delegate shutting down");
    }

    /// Apply one event. Returns the transfer outcome for events that move
    /// data.
    pub async fn handle(&self, event: TopologyEvent) -> Option<TransferOutcome> {
        match event {
            TopologyEvent::NewPredecessor {
                local,
                new_pred,
                old_pred,
            } => {
                info!(
                    local = %local.short_id(),
                    new_pred = %new_pred.short_id(),
                    old_pred = ?old_pred.as_ref().map(VnodeRef::short_id),
                    "new predecessor"
                );
                Some(self.transfer(&local, &new_pred).await)
            }
            TopologyEvent::Leaving { local, pred, succ } => {
                info!(
                    local = %local.short_id(),
                    pred = ?pred.as_ref().map(VnodeRef::short_id),
                    succ = ?succ.as_ref().map(VnodeRef::short_id),
                    "local vnode leaving"
                );
                match succ {
                    Some(succ) => Some(self.transfer(&local, &succ).await),
                    None => {
                        warn!(local = %local.short_id(), "leaving without a successor, data not handed off");
                        None
                    }
                }
            }
            TopologyEvent::PredecessorLeaving { local, remote } => {
                info!(local = %local.short_id(), remote = %remote.short_id(), "predecessor leaving");
                None
            }
            TopologyEvent::SuccessorLeaving { local, remote } => {
                info!(local = %local.short_id(), remote = %remote.short_id(), "successor leaving");
                None
            }
            TopologyEvent::Shutdown => {
                info!("ring shutting down");
                None
            }
        }
    }

    /// Snapshot `from` and merge it into `to`.
    pub async fn transfer(&self, from: &VnodeRef, to: &VnodeRef) -> TransferOutcome {
        let snapshot = match self.store.snapshot(from).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(from = %from.short_id(), "nothing to transfer");
                return TransferOutcome::Skipped;
            }
            Err(e) => {
                warn!(from = %from.short_id(), error = %e, "snapshot failed");
                return TransferOutcome::Failed(e);
            }
        };
        match self.store.restore(to, &snapshot).await {
            Ok(()) => {
                info!(
                    from = %from.short_id(),
                    to = %to.short_id(),
                    bytes = snapshot.len(),
                    "transferred vnode data"
                );
                TransferOutcome::Transferred {
                    bytes: snapshot.len(),
                }
            }
            Err(e) => {
                warn!(from = %from.short_id(), to = %to.short_id(), error = %e, "restore failed");
                TransferOutcome::Failed(e)
            }
        }
    }
}
