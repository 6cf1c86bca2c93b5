use std::net::SocketAddr;

use messenger_frame::{FrameReader, FrameWriter};
use messenger_transport::{connect_timeout, MessengerStream};

use crate::config::ClientConfig;
use crate::error::Result;

/// A freshly established broker connection, handshake already sent.
pub struct Connection {
    pub reader: FrameReader<MessengerStream>,
    pub writer: FrameWriter<MessengerStream>,
    control: MessengerStream,
    peer: SocketAddr,
}

impl Connection {
    /// Broker address this connection reached.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Shut the socket down in both directions.
    ///
    /// Unblocks any reader or writer still using a clone of the stream.
    pub fn close(&self) {
        self.control.shutdown();
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        FrameReader<MessengerStream>,
        FrameWriter<MessengerStream>,
        MessengerStream,
    ) {
        (self.reader, self.writer, self.control)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Open one connection to the configured broker and send the handshake.
///
/// This makes a single attempt; retrying is up to the caller.
pub fn connect(config: &ClientConfig) -> Result<Connection> {
    config.validate()?;

    let stream = connect_timeout(&config.host, config.port, config.connect_timeout)?;
    stream.set_nodelay(true)?;
    stream.set_keepalive(true)?;
    let peer = stream.peer_addr()?;

    let control = stream.try_clone()?;
    let reader_stream = stream.try_clone()?;

    let frame_config = config.frame_config();
    let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
    let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;

    if let Err(err) = writer.write_handshake(&config.name) {
        control.shutdown();
        return Err(err.into());
    }

    tracing::debug!(%peer, name = %config.name, "handshake sent");
    Ok(Connection {
        reader,
        writer,
        control,
        peer,
    })
}
