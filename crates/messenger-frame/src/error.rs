/// A value that cannot be represented in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Strings carry a 2-byte length prefix.
    #[error("string too long ({len} bytes, max {max})")]
    StringTooLong { len: usize, max: usize },

    /// Characters are sent as a single 2-byte code unit.
    #[error("character {0:?} does not fit in a 2-byte code unit")]
    CharOutOfRange(char),
}

/// Errors raised while reading values out of a message payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The read needs more bytes than the payload has left.
    #[error("payload underflow (needed {needed} bytes, {remaining} remaining)")]
    Underflow { needed: usize, remaining: usize },

    /// A string value is not valid UTF-8.
    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A character code unit is a lone surrogate.
    #[error("invalid character code unit 0x{0:04x}")]
    InvalidChar(u16),
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The message type name is not valid UTF-8.
    #[error("invalid message type: {0}")]
    InvalidType(#[source] std::str::Utf8Error),

    /// A type name or identity string could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
