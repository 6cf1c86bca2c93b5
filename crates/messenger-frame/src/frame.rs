use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{put_str, MAX_STRING_LEN};
use crate::error::{EncodeError, FrameError, Result};

/// Fixed bytes around each frame: type length (2) + payload length (4).
pub const FRAME_OVERHEAD: usize = 6;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One typed message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type name; doubles as the routing key.
    pub msg_type: String,
    /// Opaque message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(msg_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (lengths + type + payload).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.msg_type.len() + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬─────────────┬──────────────┬──────────────────┐
/// │ Type len  │ Type        │ Payload len  │ Payload          │
/// │ (2B BE)   │ (UTF-8)     │ (4B BE)      │ (Length bytes)   │
/// └───────────┴─────────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_frame(msg_type: &str, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if msg_type.len() > MAX_STRING_LEN {
        return Err(EncodeError::StringTooLong {
            len: msg_type.len(),
            max: MAX_STRING_LEN,
        }
        .into());
    }
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }

    dst.reserve(FRAME_OVERHEAD + msg_type.len() + payload.len());
    put_str(dst, msg_type)?;
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < 2 {
        return Ok(None);
    }

    let type_len = u16::from_be_bytes([src[0], src[1]]) as usize;
    let header_len = 2 + type_len + 4;
    if src.len() < header_len {
        return Ok(None);
    }

    let len_at = 2 + type_len;
    let payload_len = u32::from_be_bytes([
        src[len_at],
        src[len_at + 1],
        src[len_at + 2],
        src[len_at + 3],
    ]) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = header_len + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(2);
    let type_bytes = src.split_to(type_len);
    src.advance(4);
    let payload = src.split_to(payload_len).freeze();

    let msg_type = std::str::from_utf8(&type_bytes)
        .map_err(FrameError::InvalidType)?
        .to_string();

    Ok(Some(Frame { msg_type, payload }))
}

/// Encode the one-time identity handshake: `[name_len:2][name utf8]`.
///
/// This is not a frame; it is written once, right after connecting.
pub fn encode_handshake(name: &str, dst: &mut BytesMut) -> Result<()> {
    dst.reserve(2 + name.len());
    put_str(dst, name)?;
    Ok(())
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
