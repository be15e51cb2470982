//! Peer transport for RingStore.
//!
//! [`StoreTransport`] is the client side: it implements
//! [`Store`](ringstore_store::Store) by forwarding every per-vnode call to
//! the vnode's host over pooled TCP connections. [`RpcServer`] is the other
//! end: it accepts connections and dispatches each call to a local `Store`
//! (normally the node's router).

pub mod client;
pub mod error;
pub mod pool;
pub mod server;

pub use client::{StoreTransport, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use pool::{Connection, ConnectionPool};
pub use server::RpcServer;
