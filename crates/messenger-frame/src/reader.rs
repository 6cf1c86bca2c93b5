use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use messenger_transport::MessengerStream;

use crate::frame::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Reads exactly the bytes each frame declares and never more, so the
/// stream is left positioned on the next frame boundary. Partial reads
/// are retried until the frame is complete.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached,
    /// whether at a frame boundary or in the middle of a frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        self.buf.clear();

        self.fill(2)?;
        let type_len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;

        self.fill(type_len + 4)?;
        let len_at = 2 + type_len;
        let payload_len = u32::from_be_bytes([
            self.buf[len_at],
            self.buf[len_at + 1],
            self.buf[len_at + 2],
            self.buf[len_at + 3],
        ]) as usize;

        if payload_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }

        self.fill(payload_len)?;

        let frame = decode_frame(&mut self.buf, self.config.max_payload_size)?
            .ok_or(FrameError::ConnectionClosed)?;
        tracing::trace!(
            msg_type = %frame.msg_type,
            size = frame.payload.len(),
            "frame received"
        );
        Ok(frame)
    }

    /// Read the identity string a client sends right after connecting.
    pub fn read_handshake(&mut self) -> Result<String> {
        self.buf.clear();

        self.fill(2)?;
        let name_len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        self.fill(name_len)?;

        let name = std::str::from_utf8(&self.buf[2..]).map_err(FrameError::InvalidType)?;
        Ok(name.to_string())
    }

    /// Append exactly `count` bytes from the stream to the buffer.
    fn fill(&mut self, count: usize) -> Result<()> {
        let start = self.buf.len();
        let end = start + count;
        self.buf.resize(end, 0);

        let mut filled = start;
        while filled < end {
            match self.inner.read(&mut self.buf[filled..end]) {
                Ok(0) => {
                    self.buf.truncate(filled);
                    return Err(FrameError::ConnectionClosed);
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(filled);
                    return Err(FrameError::Io(err));
                }
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl FrameReader<MessengerStream> {
    /// Create a frame reader for a broker stream and apply the read timeout from config.
    pub fn with_config_stream(inner: MessengerStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Non-blocking check for at least one readable byte (or a hangup).
    pub fn poll_ready(&self) -> Result<bool> {
        self.inner.poll_readable().map_err(transport_to_frame_error)
    }
}

pub(crate) fn transport_to_frame_error(err: messenger_transport::TransportError) -> FrameError {
    match err {
        messenger_transport::TransportError::Io(io) => FrameError::Io(io),
        messenger_transport::TransportError::Connect { source, .. }
        | messenger_transport::TransportError::Resolve { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
