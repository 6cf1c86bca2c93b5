/// Errors that can occur in client operations.
///
/// Connection failures never surface here once a client exists: they are
/// retried in the background. What remains are values that cannot be put
/// on the wire and failures to start background threads.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] messenger_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] messenger_frame::FrameError),

    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A value could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] messenger_frame::EncodeError),

    /// A background thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

/// A client configuration the client cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An interval or timeout is zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    /// The identity does not fit in the handshake's length prefix.
    #[error("client name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ClientError>;
