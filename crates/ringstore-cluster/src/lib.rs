//! Replication core for RingStore.
//!
//! Turns single logical reads and writes into per-replica operations on a
//! consistent-hash ring, routes each one to a local store or a remote peer,
//! migrates data when ring membership changes, and repairs replicas found
//! inconsistent.
//!
//! # Components
//!
//! - [`Ring`] / [`StaticRing`] — replica set resolution
//! - [`Router`] — location-transparent [`Store`](ringstore_store::Store)
//! - [`Coordinator`] — N-way fan-out with hash-gated updates
//! - [`TopologyDelegate`] — snapshot transfer on membership events
//! - [`HealingEngine`] — single-worker repair loop fed by a [`HealQueue`]
//!
//! # Design Rules
//!
//! 1. Replica sets are resolved on every call, never cached.
//! 2. A fan-out returns exactly one result per resolved vnode, in ring order.
//! 3. Per-replica failures never abort a fan-out; only ring lookup failure
//!    and an update's inconsistency check do.
//! 4. An update writes nothing unless every replica agreed on the current
//!    value.

pub mod coordinator;
pub mod delegate;
pub mod error;
pub mod heal;
pub mod ring;
pub mod router;

pub use coordinator::Coordinator;
pub use delegate::{
    create_topology_delegate, TopologyDelegate, TopologyEvent, TopologyEvents, TransferOutcome,
};
pub use error::{ClusterError, ClusterResult, RingError};
pub use heal::{heal_key, heal_queue, HealQueue, HealReport, HealingEngine, HEAL_REPLICAS};
pub use ring::{Ring, StaticRing};
pub use router::Router;
