use std::time::Duration;

use ringstore_protocol::ProtocolError;
use ringstore_types::ReplicaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is shut down")]
    Shutdown,

    #[error("cannot reach {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("call to {host} timed out after {after:?}")]
    Timeout { host: String, after: Duration },

    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("remote fault: {0}")]
    RemoteFault(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// The connection broke underneath the call (peer hung up or reset).
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Protocol(ProtocolError::ConnectionClosed | ProtocolError::Io(_))
        )
    }
}

impl From<TransportError> for ReplicaError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Shutdown => ReplicaError::TransportShutdown,
            other => ReplicaError::TransportUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_keeps_its_kind() {
        let err: ReplicaError = TransportError::Shutdown.into();
        assert_eq!(err, ReplicaError::TransportShutdown);
    }

    #[test]
    fn connection_loss_is_distinguished() {
        assert!(TransportError::Protocol(ProtocolError::ConnectionClosed).is_connection_lost());
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(TransportError::Protocol(ProtocolError::Io(reset)).is_connection_lost());
        assert!(!TransportError::Shutdown.is_connection_lost());
        assert!(!TransportError::RemoteFault("boom".into()).is_connection_lost());
    }

    #[test]
    fn timeouts_are_unavailability() {
        let err: ReplicaError = TransportError::Timeout {
            host: "10.0.0.2:7000".into(),
            after: Duration::from_millis(250),
        }
        .into();
        assert!(matches!(err, ReplicaError::TransportUnavailable(ref m) if m.contains("timed out")));
    }
}
