use thiserror::Error;

/// Errors from resolving a replica set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RingError {
    #[error("ring has no vnodes")]
    Empty,

    #[error("replica count must be at least 1")]
    ZeroReplicas,

    #[error("cannot place {requested} replicas on a ring of {available} vnodes")]
    NotEnoughVnodes { requested: usize, available: usize },
}

/// Top-level errors of a replicated operation.
///
/// Per-replica failures are never reported here; they travel in the
/// per-vnode results.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("ring lookup failed: {0}")]
    RingLookupFailed(#[from] RingError),

    #[error("inconsistent key {key}: replica hashes {first} and {second} differ")]
    Inconsistent {
        key: String,
        first: String,
        second: String,
    },

    #[error("fatal: all replicas of {key} exhausted")]
    Exhausted { key: String },

    #[error("failed to read object source: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
