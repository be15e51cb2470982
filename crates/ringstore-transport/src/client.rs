use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ringstore_protocol::{RpcMessage, WireError};
use ringstore_store::Store;
use ringstore_types::{ContentHash, ReplicaError, ReplicaResult, VnodeRef};
use tracing::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::pool::{Connection, ConnectionPool};

/// Client-side transport settings.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Deadline for one call, dialing included.
    pub rpc_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(10),
        }
    }
}

/// Remote [`Store`] reached over the peer RPC protocol.
///
/// Every call is addressed to `vnode.host`. Connections are pooled per host
/// and only returned to the pool after a complete exchange; a connection
/// whose call failed or timed out is dropped.
pub struct StoreTransport {
    pool: ConnectionPool,
    config: TransportConfig,
}

impl StoreTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            pool: ConnectionPool::new(),
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Number of idle pooled connections to `host`.
    pub fn idle_connections(&self, host: &str) -> usize {
        self.pool.idle_count(host)
    }

    /// Run one exchange on a pooled connection under the call deadline.
    ///
    /// A pooled connection the peer has since closed is replaced by a fresh
    /// dial once, within the same deadline. Failures on a fresh connection
    /// are final.
    async fn call<T, F, Fut>(&self, host: &str, exchange: F) -> TransportResult<T>
    where
        F: Fn(Connection) -> Fut + Send + Sync,
        Fut: Future<Output = TransportResult<(Connection, T)>> + Send,
    {
        let after = self.config.rpc_timeout;
        let attempt = async {
            let conn = self.pool.acquire(host).await?;
            let reused = conn.is_reused();
            match exchange(conn).await {
                Err(e) if reused && e.is_connection_lost() => {
                    debug!(host, error = %e, "pooled connection went stale, redialing");
                    exchange(Connection::dial(host).await?).await
                }
                outcome => outcome,
            }
        };
        match tokio::time::timeout(after, attempt).await {
            Ok(Ok((conn, out))) => {
                self.pool.release(conn);
                Ok(out)
            }
            Ok(Err(e)) => {
                debug!(host, error = %e, "call failed, connection dropped");
                Err(e)
            }
            Err(_) => Err(TransportError::Timeout {
                host: host.to_string(),
                after,
            }),
        }
    }

    async fn unary(&self, host: &str, request: RpcMessage) -> TransportResult<RpcMessage> {
        let request = &request;
        self.call(host, |mut conn| async move {
            conn.send(request).await?;
            let response = conn.recv().await?;
            Ok::<_, TransportError>((conn, response))
        })
        .await
    }

    /// Send a header followed by a chunk stream; the server answers once.
    async fn upload(
        &self,
        host: &str,
        header: RpcMessage,
        data: Bytes,
    ) -> TransportResult<RpcMessage> {
        let (header, data) = (&header, &data);
        self.call(host, |mut conn| async move {
            conn.send(header).await?;
            conn.send_stream(data).await?;
            let response = conn.recv().await?;
            Ok::<_, TransportError>((conn, response))
        })
        .await
    }

    /// Send a request and collect the chunk stream the server answers with.
    async fn download(
        &self,
        host: &str,
        request: RpcMessage,
    ) -> TransportResult<(Vec<u8>, Option<WireError>)> {
        let request = &request;
        self.call(host, |mut conn| async move {
            conn.send(request).await?;
            let stream = conn.recv_stream().await?;
            Ok::<_, TransportError>((conn, stream))
        })
        .await
    }
}

impl Default for StoreTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

fn expect_ack(response: RpcMessage) -> ReplicaResult<()> {
    match response {
        RpcMessage::Ack { error: None } => Ok(()),
        RpcMessage::Ack { error: Some(err) } => Err(err.into_replica()),
        other => Err(unexpected("Ack", other).into()),
    }
}

fn expect_value(response: RpcMessage) -> ReplicaResult<Vec<u8>> {
    match response {
        RpcMessage::Value {
            error: Some(err), ..
        } => Err(err.into_replica()),
        RpcMessage::Value {
            data: Some(data), ..
        } => Ok(data),
        RpcMessage::Value { .. } => Err(ReplicaError::Storage(
            "value response carried neither data nor error".into(),
        )),
        other => Err(unexpected("Value", other).into()),
    }
}

fn unexpected(expected: &'static str, actual: RpcMessage) -> TransportError {
    match actual {
        RpcMessage::Fault { message } => TransportError::RemoteFault(message),
        other => TransportError::UnexpectedResponse {
            expected,
            actual: other.type_name(),
        },
    }
}

#[async_trait]
impl Store for StoreTransport {
    async fn get_key(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<Vec<u8>> {
        let request = RpcMessage::GetKey {
            vnode: vnode.clone(),
            key: key.to_vec(),
        };
        expect_value(self.unary(&vnode.host, request).await?)
    }

    async fn put_key(&self, vnode: &VnodeRef, key: &[u8], value: &[u8]) -> ReplicaResult<()> {
        let request = RpcMessage::PutKey {
            vnode: vnode.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        };
        expect_ack(self.unary(&vnode.host, request).await?)
    }

    async fn update_key(
        &self,
        vnode: &VnodeRef,
        prev_hash: &ContentHash,
        key: &[u8],
        value: &[u8],
    ) -> ReplicaResult<()> {
        let request = RpcMessage::UpdateKey {
            vnode: vnode.clone(),
            prev_hash: *prev_hash,
            key: key.to_vec(),
            value: value.to_vec(),
        };
        expect_ack(self.unary(&vnode.host, request).await?)
    }

    async fn remove_key(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<()> {
        let request = RpcMessage::RemoveKey {
            vnode: vnode.clone(),
            key: key.to_vec(),
        };
        expect_ack(self.unary(&vnode.host, request).await?)
    }

    async fn get_object(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<Bytes> {
        let request = RpcMessage::GetObject {
            vnode: vnode.clone(),
            key: key.to_vec(),
        };
        match self.download(&vnode.host, request).await? {
            (_, Some(err)) => Err(err.into_replica()),
            (data, None) => Ok(Bytes::from(data)),
        }
    }

    async fn put_object(&self, vnode: &VnodeRef, key: &[u8], data: Bytes) -> ReplicaResult<()> {
        let header = RpcMessage::PutObject {
            vnode: vnode.clone(),
            key: key.to_vec(),
        };
        expect_ack(self.upload(&vnode.host, header, data).await?)
    }

    async fn remove_object(&self, vnode: &VnodeRef, key: &[u8]) -> ReplicaResult<()> {
        let request = RpcMessage::RemoveObject {
            vnode: vnode.clone(),
            key: key.to_vec(),
        };
        expect_ack(self.unary(&vnode.host, request).await?)
    }

    async fn snapshot(&self, vnode: &VnodeRef) -> ReplicaResult<Option<Vec<u8>>> {
        let request = RpcMessage::Snapshot {
            vnode: vnode.clone(),
        };
        match self.download(&vnode.host, request).await? {
            (_, Some(err)) => Err(err.into_replica()),
            (data, None) if data.is_empty() => Ok(None),
            (data, None) => Ok(Some(data)),
        }
    }

    async fn restore(&self, vnode: &VnodeRef, snapshot: &[u8]) -> ReplicaResult<()> {
        let header = RpcMessage::Restore {
            vnode: vnode.clone(),
        };
        let data = Bytes::copy_from_slice(snapshot);
        expect_ack(self.upload(&vnode.host, header, data).await?)
    }

    async fn shutdown(&self) -> ReplicaResult<()> {
        let closed = self.pool.shutdown();
        info!(closed, "store transport shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use ringstore_protocol::{read_message, write_message};
    use tokio::net::TcpListener;

    use super::*;

    /// A peer that hangs up after at most one call per connection, answering
    /// it with an `Ack` when `answer` is set. Returns its address and the
    /// number of accepted sockets.
    async fn one_shot_peer(answer: bool) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                if answer {
                    read_message(&mut stream).await.unwrap();
                    write_message(&mut stream, &RpcMessage::ack(Ok(()))).await.unwrap();
                }
            }
        });
        (host, accepted)
    }

    #[tokio::test]
    async fn closed_pooled_connection_is_redialed() {
        let (host, accepted) = one_shot_peer(true).await;
        let transport = StoreTransport::default();
        let vnode = VnodeRef::new(vec![1], host.clone());

        transport.put_key(&vnode, b"k", b"v").await.unwrap();
        assert_eq!(transport.idle_connections(&host), 1);
        // let the peer's hang-up reach our pooled socket
        tokio::time::sleep(Duration::from_millis(50)).await;

        transport.put_key(&vnode, b"k", b"v2").await.unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        assert_eq!(transport.idle_connections(&host), 1);
    }

    #[tokio::test]
    async fn fresh_connection_failure_is_not_retried() {
        let (host, accepted) = one_shot_peer(false).await;
        let transport = StoreTransport::default();
        let vnode = VnodeRef::new(vec![1], host.clone());

        let err = transport.put_key(&vnode, b"k", b"v").await.unwrap_err();
        assert!(matches!(err, ReplicaError::TransportUnavailable(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(transport.idle_connections(&host), 0);
    }

    #[tokio::test]
    async fn retry_stays_within_the_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            // first connection: answer once, then hang up
            let (mut stream, _) = listener.accept().await.unwrap();
            read_message(&mut stream).await.unwrap();
            write_message(&mut stream, &RpcMessage::ack(Ok(()))).await.unwrap();
            drop(stream);
            // second connection: accept but never answer
            let (_silent, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = StoreTransport::new(TransportConfig {
            rpc_timeout: Duration::from_millis(200),
        });
        let vnode = VnodeRef::new(vec![1], host);
        transport.put_key(&vnode, b"k", b"v").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = transport.put_key(&vnode, b"k", b"v").await.unwrap_err();
        assert!(matches!(err, ReplicaError::TransportUnavailable(ref m) if m.contains("timed out")));
    }
}
