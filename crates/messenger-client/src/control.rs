use bytes::BytesMut;
use messenger_frame::{codec, DecodeError, EncodeError, Frame, MessageReader};

/// Keep-alive sent by the client once per heartbeat interval.
pub const HEARTBEAT: &str = "_Heartbeat";
/// Announces a subscription pattern to the broker.
pub const LISTEN: &str = "_Listen";
/// Tells the broker the client is leaving.
pub const DISCONNECT: &str = "_Disconnect";

/// Trailing marker that turns a pattern into a prefix match.
pub const WILDCARD: char = '*';

/// Reserved frames the broker handles itself.
///
/// On the wire these are ordinary frames; only their type names are special.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Heartbeat,
    /// Subscribe to a pattern, wildcard marker included.
    Listen(String),
    Disconnect,
}

impl ControlMessage {
    /// Type name this message travels under.
    pub fn msg_type(&self) -> &'static str {
        match self {
            ControlMessage::Heartbeat => HEARTBEAT,
            ControlMessage::Listen(_) => LISTEN,
            ControlMessage::Disconnect => DISCONNECT,
        }
    }

    /// Payload bytes for this message.
    pub fn payload(&self) -> Result<BytesMut, EncodeError> {
        let mut buf = BytesMut::new();
        if let ControlMessage::Listen(pattern) = self {
            codec::put_str(&mut buf, pattern)?;
        }
        Ok(buf)
    }

    /// Build the frame for this message.
    pub fn to_frame(&self) -> Result<Frame, EncodeError> {
        Ok(Frame::new(self.msg_type(), self.payload()?.freeze()))
    }

    /// Recognise a reserved frame.
    ///
    /// Returns `Ok(None)` for ordinary application frames.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, DecodeError> {
        let message = match frame.msg_type.as_str() {
            HEARTBEAT => ControlMessage::Heartbeat,
            DISCONNECT => ControlMessage::Disconnect,
            LISTEN => {
                let mut reader = MessageReader::new(frame.payload.clone());
                ControlMessage::Listen(reader.read_string()?)
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}
