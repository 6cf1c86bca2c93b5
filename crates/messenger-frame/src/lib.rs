//! Message framing and value codec for the Messenger protocol.
//!
//! Every message on the wire is framed as:
//! - A 2-byte big-endian type name length, followed by the UTF-8 type name
//! - A 4-byte big-endian payload length, followed by the payload bytes
//!
//! There is no outer envelope and no magic number; both lengths must be
//! consumed exactly or the stream desynchronises for good.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod reader;
pub mod writer;

pub use error::{DecodeError, EncodeError, FrameError, Result};
pub use frame::{
    decode_frame, encode_frame, encode_handshake, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    FRAME_OVERHEAD,
};
pub use message::MessageReader;
pub use reader::FrameReader;
pub use writer::FrameWriter;
