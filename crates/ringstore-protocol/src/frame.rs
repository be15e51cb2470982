//! Async frame I/O over any tokio byte stream.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::RpcCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{RpcMessage, WireError, CHUNK_SIZE};

/// Write one framed message and flush.
pub async fn write_message<W>(writer: &mut W, msg: &RpcMessage) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = RpcCodec::encode(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(kind = msg.type_name(), bytes = frame.len(), "sent frame");
    Ok(())
}

/// Read one framed message.
///
/// A peer that closes the connection between frames yields
/// [`ProtocolError::ConnectionClosed`]; closing mid-frame is an I/O error.
pub async fn read_message<R>(reader: &mut R) -> ProtocolResult<RpcMessage>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }
    let len = RpcCodec::frame_len(prefix)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let msg = RpcCodec::decode_body(&body)?;
    trace!(kind = msg.type_name(), bytes = len + 4, "received frame");
    Ok(msg)
}

/// Send `data` as a chunk stream closed by a clean `StreamEnd`.
///
/// Empty data sends no chunks at all. Returns the number of chunks sent.
pub async fn write_stream<W>(writer: &mut W, data: &[u8]) -> ProtocolResult<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    for chunk in data.chunks(CHUNK_SIZE) {
        write_message(writer, &RpcMessage::Chunk { data: chunk.to_vec() }).await?;
        sent += 1;
    }
    write_message(writer, &RpcMessage::StreamEnd { error: None }).await?;
    Ok(sent)
}

/// Collect a chunk stream up to its `StreamEnd`.
///
/// Returns the reassembled bytes and the error the sender closed the
/// stream with, if any.
pub async fn read_stream<R>(reader: &mut R) -> ProtocolResult<(Vec<u8>, Option<WireError>)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut data = Vec::new();
    loop {
        match read_message(reader).await? {
            RpcMessage::Chunk { data: chunk } => {
                if chunk.len() > CHUNK_SIZE {
                    return Err(ProtocolError::FramingError(format!(
                        "chunk of {} bytes exceeds {CHUNK_SIZE}",
                        chunk.len()
                    )));
                }
                data.extend_from_slice(&chunk);
            }
            RpcMessage::StreamEnd { error } => return Ok((data, error)),
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    expected: "Chunk",
                    actual: other.type_name(),
                })
            }
        }
    }
}
