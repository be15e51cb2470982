use ringstore_types::{ContentHash, ReplicaError};

/// Errors from vnode store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key is absent from the key/value namespace.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The requested object is absent from the object namespace.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The caller's expected hash does not match the current value.
    #[error("hash mismatch for {key}: expected {expected}, current {current}")]
    HashMismatch {
        key: String,
        expected: ContentHash,
        current: ContentHash,
    },

    /// Snapshot encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk entry cannot be decoded.
    #[error("corrupt entry {path}: {reason}")]
    CorruptEntry { path: String, reason: String },

    /// A thread panicked while holding the store lock.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ReplicaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyNotFound(key) | StoreError::ObjectNotFound(key) => {
                ReplicaError::NotFound(key)
            }
            StoreError::HashMismatch { key, .. } => ReplicaError::HashMismatch(key),
            other => ReplicaError::Storage(other.to_string()),
        }
    }
}
