/// Errors that can occur while establishing or using a TCP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The broker address could not be resolved.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// The address resolved to nothing.
    #[error("no socket address found for {addr}")]
    NoAddress { addr: String },

    /// Every resolved address refused or timed out.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
