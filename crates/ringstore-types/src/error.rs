use thiserror::Error;

/// Errors from parsing or converting foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid vnode reference: {0}")]
    InvalidVnode(String),

    #[error("unknown error code: {0}")]
    UnknownErrorCode(u16),
}
