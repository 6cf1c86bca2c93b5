use std::sync::Arc;
use std::time::Instant;

use messenger_frame::MessageReader;

use crate::builder::MessageBuilder;
use crate::config::ClientConfig;
use crate::control::HEARTBEAT;
use crate::error::Result;
use crate::registry::HandlerRegistry;
use crate::supervisor::{ConnectionState, Shared};
use crate::worker::Worker;

/// A publish/subscribe client that keeps itself connected.
///
/// Construction never fails because the broker is unreachable: the client
/// starts in [`ConnectionState::Connecting`] and retries in the background.
/// Messages sent while disconnected are dropped.
pub struct MessengerClient {
    shared: Arc<Shared>,
    registry: HandlerRegistry,
    heartbeat: Option<Worker>,
    liveness: Option<(u64, Instant)>,
}

impl MessengerClient {
    /// Connect to `host:port` as `name`.
    ///
    /// With `log_errors` off, connection failures are logged at `debug`
    /// instead of `warn`.
    pub fn new(host: &str, port: u16, name: &str, log_errors: bool) -> Result<Self> {
        Self::with_config(ClientConfig::new(host, port, name).with_log_errors(log_errors))
    }

    /// Start a client from a full configuration, rejecting unusable values.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            host = %config.host,
            port = config.port,
            name = %config.name,
            "starting messenger client"
        );

        let shared = Shared::new(config);
        shared.start()?;

        let beat = Arc::clone(&shared);
        let heartbeat = match Worker::spawn("heartbeat", move |signal| beat.heartbeat_loop(signal)) {
            Ok(worker) => worker,
            Err(err) => {
                shared.close();
                return Err(err);
            }
        };

        Ok(Self {
            shared,
            registry: HandlerRegistry::new(),
            heartbeat: Some(heartbeat),
            liveness: None,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether a broker connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.shared.config()
    }

    /// Start building a message of the given type.
    pub fn prepare(&self, msg_type: &str) -> MessageBuilder<'_> {
        MessageBuilder::new(&self.shared, msg_type)
    }

    /// Send a message with an empty payload.
    pub fn send(&self, msg_type: &str) -> Result<()> {
        self.prepare(msg_type).send()
    }

    /// Register `handler` for messages matching `pattern` and subscribe to it.
    ///
    /// A trailing `*` makes the pattern a prefix match. Handlers run on the
    /// thread that calls [`read_messages`](Self::read_messages).
    pub fn add_handler<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: FnMut(&str, MessageReader) + Send + 'static,
    {
        self.shared.subscribe(pattern)?;
        self.registry.add(pattern, handler);
        Ok(())
    }

    /// Subscribe to `pattern` without registering a handler.
    pub fn listen(&self, pattern: &str) -> Result<()> {
        self.shared.subscribe(pattern)
    }

    /// Dispatch every message that has already arrived.
    ///
    /// Does not wait for new data. A read failure marks the connection lost
    /// and starts reconnecting; it is not reported to the caller.
    pub fn read_messages(&mut self) {
        let Some((epoch, mut reader)) = self.shared.take_reader() else {
            return;
        };
        let timeout = self.shared.config().heartbeat_timeout;
        let now = Instant::now();
        let mut last_heartbeat = match self.liveness {
            Some((seen, at)) if seen == epoch => at,
            _ => now,
        };

        loop {
            match reader.poll_ready() {
                Ok(false) => break,
                Ok(true) => {}
                Err(err) => {
                    self.shared.connection_lost(epoch, &err);
                    return;
                }
            }
            match reader.read_frame() {
                Ok(frame) => {
                    if frame.msg_type == HEARTBEAT {
                        last_heartbeat = Instant::now();
                    }
                    self.registry.dispatch(&frame.msg_type, &frame.payload);
                }
                Err(err) => {
                    self.shared.connection_lost(epoch, &err);
                    return;
                }
            }
        }

        self.liveness = Some((epoch, last_heartbeat));
        self.shared.restore_reader(epoch, reader);

        if let Some(timeout) = timeout {
            let silent = last_heartbeat.elapsed();
            if silent > timeout {
                self.shared.connection_lost(
                    epoch,
                    &format_args!("no heartbeat from broker for {silent:?}"),
                );
            }
        }
    }

    /// Leave the current broker and connect to another.
    ///
    /// Sends `_Disconnect` on the current connection, if any, then starts
    /// connecting to the new address in the background. Subscriptions and
    /// handlers carry over.
    pub fn reconnect(&mut self, host: &str, port: u16, name: &str) -> Result<()> {
        self.liveness = None;
        self.shared.reconnect(host, port, name)
    }

    /// Send `_Disconnect` and stop all background activity.
    pub fn disconnect(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        self.shared.close();
    }
}

impl Drop for MessengerClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MessengerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerClient")
            .field("state", &self.state())
            .field("handlers", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use messenger_frame::{Frame, FrameReader, FrameWriter};

    use super::*;
    use crate::control::{ControlMessage, DISCONNECT, LISTEN};

    fn wait_until(mut ready: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if ready() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn quiet_config(port: u16, name: &str) -> ClientConfig {
        ClientConfig::new("127.0.0.1", port, name)
            .with_log_errors(false)
            .with_retry_interval(Duration::from_millis(20))
            .with_heartbeat_interval(Duration::from_secs(60))
    }

    /// Next frame that is not a heartbeat.
    fn next_frame<R: Read>(reader: &mut FrameReader<R>) -> Frame {
        loop {
            let frame = reader.read_frame().expect("broker should read a frame");
            if frame.msg_type != HEARTBEAT {
                return frame;
            }
        }
    }

    /// Keep reading on the client until the broker sees a new connection.
    fn accept_while_reading(listener: &TcpListener, client: &mut MessengerClient) -> TcpStream {
        listener
            .set_nonblocking(true)
            .expect("listener should switch mode");
        let mut accepted = None;
        assert!(wait_until(|| {
            client.read_messages();
            match listener.accept() {
                Ok((stream, _)) => {
                    accepted = Some(stream);
                    true
                }
                Err(_) => false,
            }
        }));
        let stream = accepted.expect("connection accepted");
        stream
            .set_nonblocking(false)
            .expect("stream should switch mode");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("stream should take timeout");
        stream
    }

    #[test]
    fn unreachable_broker_does_not_fail_construction() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
            listener.local_addr().expect("listener has address").port()
        };
        let mut client =
            MessengerClient::with_config(quiet_config(port, "offline")).expect("client starts");

        assert_eq!(client.state(), ConnectionState::Connecting);
        client
            .prepare("Test")
            .add_int(1)
            .send()
            .expect("dropped silently");
        client.read_messages();
        client.disconnect();
    }

    #[test]
    fn overlong_name_rejected_up_front() {
        let err = MessengerClient::new("127.0.0.1", 1, &"n".repeat(70_000), false)
            .expect_err("name does not fit");
        assert!(matches!(
            err,
            crate::ClientError::Config(crate::ConfigError::NameTooLong { .. })
        ));
    }

    #[test]
    fn zero_io_timeout_rejected_up_front() {
        let config = quiet_config(1, "instant").with_io_timeout(Some(Duration::ZERO));
        let err = MessengerClient::with_config(config).expect_err("zero timeout is unusable");
        assert!(matches!(
            err,
            crate::ClientError::Config(crate::ConfigError::ZeroDuration {
                field: "io_timeout"
            })
        ));
    }

    #[test]
    fn zero_heartbeat_interval_rejected_up_front() {
        let config = quiet_config(1, "spinner").with_heartbeat_interval(Duration::ZERO);
        assert!(MessengerClient::with_config(config).is_err());
    }

    #[test]
    fn handler_receives_broker_message() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("listener has address").port();

        let mut client =
            MessengerClient::with_config(quiet_config(port, "reader")).expect("client starts");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        client
            .add_handler("Value*", move |msg_type, mut reader| {
                let value = reader.read_int().expect("int payload");
                log.lock().unwrap().push((msg_type.to_string(), value));
            })
            .expect("pattern is valid");

        let (stream, _) = listener.accept().expect("listener should accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("stream should take timeout");
        let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
        let mut writer = FrameWriter::new(stream);
        assert_eq!(reader.read_handshake().expect("handshake"), "reader");
        let listen = next_frame(&mut reader);
        assert_eq!(listen.msg_type, LISTEN);
        assert_eq!(
            ControlMessage::from_frame(&listen).expect("valid"),
            Some(ControlMessage::Listen("Value*".to_string()))
        );

        writer.send("ValueA", &[0, 0, 0, 5]).expect("broker write");
        writer.send("Other", &[0, 0, 0, 6]).expect("broker write");

        assert!(wait_until(|| {
            client.read_messages();
            !seen.lock().unwrap().is_empty()
        }));
        assert_eq!(*seen.lock().unwrap(), vec![("ValueA".to_string(), 5)]);

        client.disconnect();
        assert_eq!(next_frame(&mut reader).msg_type, DISCONNECT);
    }

    #[test]
    fn read_failure_triggers_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("listener has address").port();

        let mut client =
            MessengerClient::with_config(quiet_config(port, "flaky")).expect("client starts");
        let (first, _) = listener.accept().expect("first connection");
        assert!(wait_until(|| client.is_connected()));

        drop(first);
        let second = accept_while_reading(&listener, &mut client);
        let mut reader = FrameReader::new(second);
        assert_eq!(reader.read_handshake().expect("handshake"), "flaky");
        assert!(wait_until(|| client.is_connected()));
    }

    #[test]
    fn heartbeat_timeout_drops_silent_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("listener has address").port();

        let config =
            quiet_config(port, "watchful").with_heartbeat_timeout(Some(Duration::from_millis(50)));
        let mut client = MessengerClient::with_config(config).expect("client starts");
        let (silent, _) = listener.accept().expect("first connection");
        assert!(wait_until(|| client.is_connected()));

        client.read_messages();
        thread::sleep(Duration::from_millis(100));

        let second = accept_while_reading(&listener, &mut client);
        let mut reader = FrameReader::new(second);
        assert_eq!(reader.read_handshake().expect("handshake"), "watchful");

        silent
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("stream should take timeout");
        let mut old = FrameReader::new(silent);
        assert_eq!(old.read_handshake().expect("handshake"), "watchful");
        assert!(wait_until(|| matches!(
            old.read_frame(),
            Err(messenger_frame::FrameError::ConnectionClosed)
        )));
    }
}
