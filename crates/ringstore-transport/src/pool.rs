use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ringstore_protocol::{
    read_message, read_stream, write_message, write_stream, RpcMessage, WireError,
};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// One outbound connection to a peer.
pub struct Connection {
    host: String,
    stream: TcpStream,
    reused: bool,
}

impl Connection {
    /// Dial `host` directly, bypassing any pool.
    pub async fn dial(host: &str) -> TransportResult<Self> {
        let stream = TcpStream::connect(host)
            .await
            .map_err(|e| TransportError::Unreachable {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;
        debug!(host, "dialed peer");
        Ok(Self {
            host: host.to_string(),
            stream,
            reused: false,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether this connection sat idle in a pool before this call.
    ///
    /// The peer may have closed it in the meantime.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub async fn send(&mut self, msg: &RpcMessage) -> TransportResult<()> {
        write_message(&mut self.stream, msg).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> TransportResult<RpcMessage> {
        Ok(read_message(&mut self.stream).await?)
    }

    pub async fn send_stream(&mut self, data: &[u8]) -> TransportResult<usize> {
        Ok(write_stream(&mut self.stream, data).await?)
    }

    pub async fn recv_stream(&mut self) -> TransportResult<(Vec<u8>, Option<WireError>)> {
        Ok(read_stream(&mut self.stream).await?)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("host", &self.host).finish()
    }
}

/// Idle outbound connections keyed by host.
///
/// The map lock is only held to push or pop; dialing happens outside it,
/// so concurrent callers may dial extra connections to the same host.
#[derive(Default)]
pub struct ConnectionPool {
    idle: Mutex<HashMap<String, Vec<Connection>>>,
    shutdown: AtomicBool,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn idle(&self) -> MutexGuard<'_, HashMap<String, Vec<Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle connection to `host`, or dial a new one.
    pub async fn acquire(&self, host: &str) -> TransportResult<Connection> {
        if self.is_shutdown() {
            return Err(TransportError::Shutdown);
        }
        let pooled = self.idle().get_mut(host).and_then(Vec::pop);
        match pooled {
            Some(mut conn) => {
                conn.reused = true;
                Ok(conn)
            }
            None => Connection::dial(host).await,
        }
    }

    /// Return a healthy connection. After shutdown the connection is closed.
    pub fn release(&self, conn: Connection) {
        let mut idle = self.idle();
        if self.is_shutdown() {
            return;
        }
        idle.entry(conn.host.clone()).or_default().push(conn);
    }

    /// Mark the pool shut down and close every idle connection.
    ///
    /// Returns the number of connections closed.
    pub fn shutdown(&self) -> usize {
        self.shutdown.store(true, Ordering::SeqCst);
        let drained: Vec<Connection> = self.idle().drain().flat_map(|(_, conns)| conns).collect();
        drained.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of idle connections pooled for `host`.
    pub fn idle_count(&self, host: &str) -> usize {
        self.idle().get(host).map_or(0, Vec::len)
    }
}
