use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use ringstore_protocol::{
    read_message, read_stream, write_message, write_stream, ProtocolError, ProtocolResult,
    RpcMessage, WireError,
};
use ringstore_store::Store;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::TransportResult;

/// Accepts peer connections and serves per-vnode calls from a [`Store`].
///
/// Each connection is served by its own task and may carry any number of
/// sequential calls. Application errors travel back in the response and
/// keep the connection open; protocol violations close it.
#[derive(Clone)]
pub struct RpcServer {
    store: Arc<dyn Store>,
}

impl RpcServer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> TransportResult<()>
    where
        S: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        info!(%addr, "rpc server listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(%addr, "rpc server stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(store, stream).await {
                            debug!(%peer, error = %e, "peer connection closed with error");
                        }
                    });
                }
            }
        }
    }
}

async fn serve_connection(store: Arc<dyn Store>, mut stream: TcpStream) -> ProtocolResult<()> {
    stream.set_nodelay(true)?;
    loop {
        let request = match read_message(&mut stream).await {
            Ok(msg) => msg,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        dispatch(store.as_ref(), &mut stream, request).await?;
    }
}

async fn dispatch(
    store: &dyn Store,
    stream: &mut TcpStream,
    request: RpcMessage,
) -> ProtocolResult<()> {
    let kind = request.type_name();
    match request {
        RpcMessage::PutKey { vnode, key, value } => {
            let result = store.put_key(&vnode, &key, &value).await;
            write_message(stream, &RpcMessage::ack(result)).await
        }
        RpcMessage::GetKey { vnode, key } => {
            let result = store.get_key(&vnode, &key).await;
            write_message(stream, &RpcMessage::value(result)).await
        }
        RpcMessage::UpdateKey {
            vnode,
            prev_hash,
            key,
            value,
        } => {
            let result = store.update_key(&vnode, &prev_hash, &key, &value).await;
            write_message(stream, &RpcMessage::ack(result)).await
        }
        RpcMessage::RemoveKey { vnode, key } => {
            let result = store.remove_key(&vnode, &key).await;
            write_message(stream, &RpcMessage::ack(result)).await
        }
        RpcMessage::RemoveObject { vnode, key } => {
            let result = store.remove_object(&vnode, &key).await;
            write_message(stream, &RpcMessage::ack(result)).await
        }
        RpcMessage::PutObject { vnode, key } => {
            let result = match read_stream(stream).await? {
                (_, Some(err)) => Err(err.into_replica()),
                (data, None) => store.put_object(&vnode, &key, Bytes::from(data)).await,
            };
            write_message(stream, &RpcMessage::ack(result)).await
        }
        RpcMessage::Restore { vnode } => {
            let result = match read_stream(stream).await? {
                (_, Some(err)) => Err(err.into_replica()),
                (data, None) if data.is_empty() => Ok(()),
                (data, None) => store.restore(&vnode, &data).await,
            };
            write_message(stream, &RpcMessage::ack(result)).await
        }
        RpcMessage::GetObject { vnode, key } => match store.get_object(&vnode, &key).await {
            Ok(data) => write_stream(stream, &data).await.map(drop),
            Err(err) => end_with_error(stream, WireError::from(&err)).await,
        },
        RpcMessage::Snapshot { vnode } => match store.snapshot(&vnode).await {
            Ok(Some(data)) => write_stream(stream, &data).await.map(drop),
            Ok(None) => write_stream(stream, &[]).await.map(drop),
            Err(err) => end_with_error(stream, WireError::from(&err)).await,
        },
        RpcMessage::Chunk { .. }
        | RpcMessage::StreamEnd { .. }
        | RpcMessage::Ack { .. }
        | RpcMessage::Value { .. }
        | RpcMessage::Fault { .. } => {
            let fault = RpcMessage::Fault {
                message: format!("{kind} is not a request"),
            };
            write_message(stream, &fault).await?;
            Err(ProtocolError::UnexpectedMessage {
                expected: "request",
                actual: kind,
            })
        }
    }
}

async fn end_with_error(stream: &mut TcpStream, error: WireError) -> ProtocolResult<()> {
    write_message(stream, &RpcMessage::StreamEnd { error: Some(error) }).await
}
