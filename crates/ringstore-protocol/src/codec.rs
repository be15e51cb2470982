use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{RpcMessage, MAX_MESSAGE_SIZE};

/// Size of the frame header: 4 bytes length + 1 byte type tag.
pub const HEADER_SIZE: usize = 5;

/// Codec for encoding/decoding RingStore RPC messages.
pub struct RpcCodec;

impl RpcCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &RpcMessage) -> ProtocolResult<Vec<u8>> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(RpcMessage, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = Self::frame_len([data[0], data[1], data[2], data[3]])?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_body(&data[4..total])?;
        Ok((msg, total))
    }

    /// Validate a length prefix and return the body length (tag + payload).
    pub fn frame_len(prefix: [u8; 4]) -> ProtocolResult<usize> {
        let len = u32::from_be_bytes(prefix) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(len)
    }

    /// Decode a frame body (tag followed by payload), checking the tag.
    pub fn decode_body(body: &[u8]) -> ProtocolResult<RpcMessage> {
        let (&tag, payload) = body
            .split_first()
            .ok_or_else(|| ProtocolError::FramingError("missing type tag".into()))?;
        let msg = Self::decode_payload(payload)?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &RpcMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<RpcMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;
    use ringstore_types::{ContentHash, VnodeRef};

    fn vn() -> VnodeRef {
        VnodeRef::new(vec![1, 2, 3, 4], "127.0.0.1:7000")
    }

    #[test]
    fn request_survives_framing() {
        let msg = RpcMessage::UpdateKey {
            vnode: vn(),
            prev_hash: ContentHash::from_hash([9; 32]),
            key: b"mytestkey".to_vec(),
            value: b"newValue".to_vec(),
        };
        let encoded = RpcCodec::encode(&msg).unwrap();
        let (decoded, consumed) = RpcCodec::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn frame_header_layout() {
        let msg = RpcMessage::Chunk { data: vec![0xaa; 3] };
        let encoded = RpcCodec::encode(&msg).unwrap();
        let len = u32::from_be_bytes(encoded[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, encoded.len() - 4);
        assert_eq!(encoded[4], 10);
    }

    #[test]
    fn decode_consumes_one_frame_of_many() {
        let first = RpcCodec::encode(&RpcMessage::Snapshot { vnode: vn() }).unwrap();
        let second = RpcCodec::encode(&RpcMessage::StreamEnd { error: None }).unwrap();
        let mut buf = first.clone();
        buf.extend_from_slice(&second);

        let (msg, consumed) = RpcCodec::decode(&buf).unwrap();
        assert_eq!(consumed, first.len());
        assert_eq!(msg.type_name(), "Snapshot");
        let (msg, _) = RpcCodec::decode(&buf[consumed..]).unwrap();
        assert_eq!(msg.type_name(), "StreamEnd");
    }

    #[test]
    fn type_tags_unique() {
        let msgs: Vec<RpcMessage> = vec![
            RpcMessage::PutKey { vnode: vn(), key: vec![], value: vec![] },
            RpcMessage::GetKey { vnode: vn(), key: vec![] },
            RpcMessage::UpdateKey {
                vnode: vn(),
                prev_hash: ContentHash::from_hash([0; 32]),
                key: vec![],
                value: vec![],
            },
            RpcMessage::RemoveKey { vnode: vn(), key: vec![] },
            RpcMessage::RemoveObject { vnode: vn(), key: vec![] },
            RpcMessage::PutObject { vnode: vn(), key: vec![] },
            RpcMessage::GetObject { vnode: vn(), key: vec![] },
            RpcMessage::Snapshot { vnode: vn() },
            RpcMessage::Restore { vnode: vn() },
            RpcMessage::Chunk { data: vec![] },
            RpcMessage::StreamEnd { error: None },
            RpcMessage::Ack { error: None },
            RpcMessage::Value { data: None, error: None },
            RpcMessage::Fault { message: String::new() },
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }

    #[test]
    fn decode_truncated() {
        let err = RpcCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0];
        let err = RpcCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_rejects_oversized_prefix() {
        let err = RpcCodec::frame_len(u32::MAX.to_be_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn decode_rejects_mismatched_tag() {
        let mut encoded = RpcCodec::encode(&RpcMessage::Ack { error: None }).unwrap();
        encoded[4] = 13;
        let err = RpcCodec::decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessageType(13)));
    }
}
