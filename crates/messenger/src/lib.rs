//! Publish/subscribe messaging over the Messenger broker protocol.
//!
//! A client connects to a broker over TCP, announces an identity, and then
//! exchanges typed messages. The client reconnects by itself and sends a
//! heartbeat on a fixed interval; applications only send messages and
//! periodically call [`read_messages`](client::MessengerClient::read_messages).
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection setup and socket options
//! - [`frame`]: Value codec, frame encoding and blocking frame I/O
//! - [`client`]: The self-reconnecting client and handler registry
//! - [`logging`]: `tracing` subscriber setup (behind `logging` feature)

/// Re-export transport types.
pub mod transport {
    pub use messenger_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use messenger_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use messenger_client::*;
}

#[cfg(feature = "logging")]
pub mod logging;

pub use messenger_client::{
    ClientConfig, ClientError, ConnectionState, MessageBuilder, MessageReader, MessengerClient,
    Result, DEFAULT_PORT,
};
