//! TCP transport for the Messenger protocol.
//!
//! This is the lowest layer of the client. It resolves the broker address,
//! opens a bounded-time TCP connection, applies socket options and exposes
//! the connected [`MessengerStream`] that everything else builds on.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::MessengerStream;
pub use tcp::{connect_timeout, DEFAULT_CONNECT_TIMEOUT};
