use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use messenger_frame::{codec, EncodeError};

use crate::error::Result;
use crate::supervisor::Shared;

/// Accumulates one outgoing message.
///
/// Values are appended in call order with the same encoding
/// [`MessageReader`](crate::MessageReader) decodes. If any value cannot be
/// encoded the first failure is kept and reported by [`send`](Self::send);
/// nothing is transmitted in that case.
#[must_use = "a message is only transmitted by calling send()"]
pub struct MessageBuilder<'a> {
    shared: &'a Arc<Shared>,
    msg_type: String,
    buf: BytesMut,
    error: Option<EncodeError>,
}

impl<'a> MessageBuilder<'a> {
    pub(crate) fn new(shared: &'a Arc<Shared>, msg_type: &str) -> Self {
        Self {
            shared,
            msg_type: msg_type.to_string(),
            buf: BytesMut::new(),
            error: None,
        }
    }

    fn encode<F>(mut self, put: F) -> Self
    where
        F: FnOnce(&mut BytesMut) -> std::result::Result<(), EncodeError>,
    {
        if self.error.is_none() {
            if let Err(err) = put(&mut self.buf) {
                self.error = Some(err);
            }
        }
        self
    }

    /// One byte, 1 for true and 0 for false.
    pub fn add_boolean(self, value: bool) -> Self {
        self.encode(|buf| {
            codec::put_bool(buf, value);
            Ok(())
        })
    }

    /// Length-prefixed UTF-8, at most 65535 bytes.
    pub fn add_string(self, value: &str) -> Self {
        self.encode(|buf| codec::put_str(buf, value))
    }

    /// One UTF-16 code unit. Characters outside the Basic Multilingual
    /// Plane cannot be encoded.
    pub fn add_char(self, value: char) -> Self {
        self.encode(|buf| codec::put_char(buf, value))
    }

    pub fn add_byte(self, value: i8) -> Self {
        self.encode(|buf| {
            codec::put_i8(buf, value);
            Ok(())
        })
    }

    pub fn add_short(self, value: i16) -> Self {
        self.encode(|buf| {
            codec::put_i16(buf, value);
            Ok(())
        })
    }

    pub fn add_int(self, value: i32) -> Self {
        self.encode(|buf| {
            codec::put_i32(buf, value);
            Ok(())
        })
    }

    pub fn add_long(self, value: i64) -> Self {
        self.encode(|buf| {
            codec::put_i64(buf, value);
            Ok(())
        })
    }

    pub fn add_float(self, value: f32) -> Self {
        self.encode(|buf| {
            codec::put_f32(buf, value);
            Ok(())
        })
    }

    pub fn add_double(self, value: f64) -> Self {
        self.encode(|buf| {
            codec::put_f64(buf, value);
            Ok(())
        })
    }

    /// Bytes appended verbatim, with no length prefix.
    pub fn add_raw(self, bytes: &[u8]) -> Self {
        self.encode(|buf| {
            buf.put_slice(bytes);
            Ok(())
        })
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Payload encoded so far.
    pub fn payload(&self) -> &[u8] {
        &self.buf
    }

    /// Transmit the message.
    ///
    /// While the client is not connected the message is silently dropped
    /// and this still returns `Ok`.
    pub fn send(self) -> Result<()> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        self.shared.send(&self.msg_type, &self.buf)
    }
}

impl std::fmt::Debug for MessageBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("msg_type", &self.msg_type)
            .field("len", &self.buf.len())
            .field("error", &self.error)
            .finish()
    }
}
