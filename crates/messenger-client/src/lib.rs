//! Publish/subscribe client for the Messenger protocol.
//!
//! This is the "just works" layer. A [`MessengerClient`] keeps itself
//! connected to a broker in the background, sends a heartbeat once per
//! interval and routes incoming messages to handlers registered by exact
//! type name or by prefix wildcard (`"Foo*"`).
//!
//! Incoming messages are only read when the caller invokes
//! [`MessengerClient::read_messages`]; there is no background reader.
//!
//! ```no_run
//! use messenger_client::MessengerClient;
//!
//! let mut client = MessengerClient::new("localhost", 5805, "example", true)?;
//! client.add_handler("Test", |msg_type, mut reader| {
//!     if let Ok(value) = reader.read_int() {
//!         println!("{msg_type}: {value}");
//!     }
//! })?;
//!
//! client.prepare("Test").add_int(42).send()?;
//! client.read_messages();
//! client.disconnect();
//! # Ok::<(), messenger_client::ClientError>(())
//! ```

pub mod builder;
pub mod config;
pub mod connector;
pub mod control;
pub mod error;
pub mod registry;

mod client;
mod supervisor;
mod worker;

pub use builder::MessageBuilder;
pub use client::MessengerClient;
pub use config::{ClientConfig, DEFAULT_PORT};
pub use connector::{connect, Connection};
pub use control::{ControlMessage, DISCONNECT, HEARTBEAT, LISTEN, WILDCARD};
pub use error::{ClientError, ConfigError, Result};
pub use messenger_frame::{DecodeError, MessageReader};
pub use registry::{HandlerRegistry, Pattern};
pub use supervisor::ConnectionState;
