//! Shared connection state and the background reconnect/heartbeat loops.
//!
//! Locks are always taken in the order reconnect slot, subscriptions, link.
//! The config lock is a leaf. Nothing acquires another lock while holding
//! the link.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use messenger_frame::{FrameError, FrameReader, FrameWriter};
use messenger_transport::MessengerStream;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::connector::{self, Connection};
use crate::control::{ControlMessage, DISCONNECT, HEARTBEAT, LISTEN};
use crate::error::Result;
use crate::registry::Subscriptions;
use crate::worker::{lock, Signal, Worker};

/// Report a connection problem at `warn` when error logging is on, `debug` otherwise.
macro_rules! report {
    ($log_errors:expr, $($arg:tt)+) => {
        if $log_errors {
            tracing::warn!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// A background task is trying to connect.
    Connecting,
    /// Handshake sent and subscriptions replayed.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

enum Outcome {
    Sent,
    Dropped,
    Rejected(FrameError),
    Lost(FrameError),
}

/// The live connection, if any.
///
/// `epoch` counts installed connections so that a failure observed on an
/// old one is never blamed on its successor.
#[derive(Default)]
struct Link {
    state: ConnectionState,
    epoch: u64,
    writer: Option<FrameWriter<MessengerStream>>,
    reader: Option<FrameReader<MessengerStream>>,
    control: Option<MessengerStream>,
}

impl Link {
    fn install(&mut self, conn: Connection) {
        let (reader, writer, control) = conn.into_parts();
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.control = Some(control);
        self.epoch += 1;
        self.state = ConnectionState::Connected;
    }

    fn close(&mut self) {
        if let Some(control) = self.control.take() {
            control.shutdown();
        }
        self.writer = None;
        self.reader = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Write one frame if connected. An I/O failure closes the link.
    fn write(&mut self, msg_type: &str, payload: &[u8]) -> Outcome {
        if self.state != ConnectionState::Connected {
            return Outcome::Dropped;
        }
        let Some(writer) = self.writer.as_mut() else {
            return Outcome::Dropped;
        };
        match writer.send(msg_type, payload) {
            Ok(()) => Outcome::Sent,
            Err(err @ (FrameError::PayloadTooLarge { .. } | FrameError::Encode(_))) => {
                Outcome::Rejected(err)
            }
            Err(err) => {
                self.close();
                Outcome::Lost(err)
            }
        }
    }
}

pub(crate) struct Shared {
    config: Mutex<ClientConfig>,
    link: Mutex<Link>,
    subscriptions: Mutex<Subscriptions>,
    reconnector: Mutex<Option<Worker>>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new(config: ClientConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            link: Mutex::new(Link::default()),
            subscriptions: Mutex::new(Subscriptions::default()),
            reconnector: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn config(&self) -> ClientConfig {
        lock(&self.config).clone()
    }

    fn log_errors(&self) -> bool {
        lock(&self.config).log_errors
    }

    pub(crate) fn state(&self) -> ConnectionState {
        lock(&self.link).state
    }

    /// Begin connecting in the background.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        let mut slot = lock(&self.reconnector);
        lock(&self.link).state = ConnectionState::Connecting;
        self.spawn_reconnect(&mut slot)
    }

    /// Send a frame on the current connection.
    ///
    /// Frames are dropped while not connected. Only values that can never be
    /// sent are returned as errors; a broken connection is handed to the
    /// reconnect task instead.
    pub(crate) fn send(self: &Arc<Self>, msg_type: &str, payload: &[u8]) -> Result<()> {
        let outcome = lock(&self.link).write(msg_type, payload);
        match outcome {
            Outcome::Sent => Ok(()),
            Outcome::Dropped => {
                tracing::trace!(msg_type, "not connected, message dropped");
                Ok(())
            }
            Outcome::Rejected(err) => Err(err.into()),
            Outcome::Lost(err) => {
                report!(self.log_errors(), msg_type, error = %err, "send failed, reconnecting");
                self.restart_reconnect();
                Ok(())
            }
        }
    }

    /// Record a subscription and announce it if currently connected.
    ///
    /// While disconnected the pattern is announced by the next successful
    /// connection instead, so each connection sees it exactly once.
    pub(crate) fn subscribe(self: &Arc<Self>, pattern: &str) -> Result<()> {
        let payload = ControlMessage::Listen(pattern.to_string()).payload()?;
        let outcome = {
            let mut subscriptions = lock(&self.subscriptions);
            if !subscriptions.insert(pattern)? {
                return Ok(());
            }
            lock(&self.link).write(LISTEN, &payload)
        };
        match outcome {
            Outcome::Sent | Outcome::Dropped => Ok(()),
            Outcome::Rejected(err) => Err(err.into()),
            Outcome::Lost(err) => {
                report!(self.log_errors(), pattern, error = %err, "listen failed, reconnecting");
                self.restart_reconnect();
                Ok(())
            }
        }
    }

    /// Take the reader out of the link for a read pass.
    pub(crate) fn take_reader(&self) -> Option<(u64, FrameReader<MessengerStream>)> {
        let mut link = lock(&self.link);
        if link.state != ConnectionState::Connected {
            return None;
        }
        let epoch = link.epoch;
        link.reader.take().map(|reader| (epoch, reader))
    }

    /// Put a reader back unless its connection has since been replaced.
    pub(crate) fn restore_reader(&self, epoch: u64, reader: FrameReader<MessengerStream>) {
        let mut link = lock(&self.link);
        if link.epoch == epoch && link.state == ConnectionState::Connected {
            link.reader = Some(reader);
        }
    }

    /// Tear down connection `epoch` after a failure and start reconnecting.
    ///
    /// Ignored if that connection is already gone.
    pub(crate) fn connection_lost(self: &Arc<Self>, epoch: u64, reason: &dyn fmt::Display) {
        {
            let mut link = lock(&self.link);
            if link.epoch != epoch || link.state != ConnectionState::Connected {
                return;
            }
            link.close();
        }
        report!(self.log_errors(), error = %reason, "connection lost, reconnecting");
        self.restart_reconnect();
    }

    /// Start a reconnect task unless one is already running.
    fn restart_reconnect(self: &Arc<Self>) {
        let mut slot = lock(&self.reconnector);
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut link = lock(&self.link);
            if link.state != ConnectionState::Disconnected {
                return;
            }
            link.state = ConnectionState::Connecting;
        }
        if let Err(err) = self.spawn_reconnect(&mut slot) {
            tracing::error!(error = %err, "cannot start reconnect task");
        }
    }

    /// Replace the reconnect task. The link must already be `Connecting`.
    fn spawn_reconnect(self: &Arc<Self>, slot: &mut Option<Worker>) -> Result<()> {
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        let shared = Arc::clone(self);
        match Worker::spawn("reconnect", move |signal| shared.reconnect_loop(signal)) {
            Ok(worker) => {
                *slot = Some(worker);
                Ok(())
            }
            Err(err) => {
                lock(&self.link).state = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    /// Point the client at a different broker and reconnect to it.
    pub(crate) fn reconnect(self: &Arc<Self>, host: &str, port: u16, name: &str) -> Result<()> {
        let mut target = self.config();
        target.host = host.to_string();
        target.port = port;
        target.name = name.to_string();
        target.validate()?;

        let mut slot = lock(&self.reconnector);
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Outcome::Lost(err) = lock(&self.link).write(DISCONNECT, &[]) {
            tracing::debug!(error = %err, "disconnect notice not delivered");
        }
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        {
            let mut link = lock(&self.link);
            link.close();
            link.state = ConnectionState::Connecting;
        }
        *lock(&self.config) = target;
        tracing::info!(host, port, name, "reconnecting to broker");
        self.spawn_reconnect(&mut slot)
    }

    /// Say goodbye to the broker and stop reconnecting. Idempotent.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Outcome::Lost(err) = lock(&self.link).write(DISCONNECT, &[]) {
            tracing::debug!(error = %err, "disconnect notice not delivered");
        }
        if let Some(worker) = lock(&self.reconnector).take() {
            worker.stop();
        }
        lock(&self.link).close();
        tracing::info!("disconnected from broker");
    }

    fn reconnect_loop(&self, signal: &Signal) {
        while !signal.is_cancelled() {
            let config = self.config();
            match self.try_establish(&config, signal) {
                Ok(Some(peer)) => {
                    tracing::info!(%peer, name = %config.name, "connected to broker");
                    return;
                }
                Ok(None) => return,
                Err(err) => {
                    report!(
                        config.log_errors,
                        host = %config.host,
                        port = config.port,
                        error = %err,
                        "connection attempt failed"
                    );
                }
            }
            if signal.wait(config.retry_interval) {
                return;
            }
        }
    }

    /// One connection attempt. Subscriptions are replayed before the link
    /// is marked connected. Returns `Ok(None)` if cancelled meanwhile.
    fn try_establish(&self, config: &ClientConfig, signal: &Signal) -> Result<Option<SocketAddr>> {
        let mut conn = connector::connect(config)?;

        let subscriptions = lock(&self.subscriptions);
        let mut link = lock(&self.link);
        if signal.is_cancelled() || self.closed.load(Ordering::SeqCst) {
            conn.close();
            return Ok(None);
        }

        if let Err(err) = replay(&mut conn, &subscriptions) {
            conn.close();
            return Err(err);
        }

        let peer = conn.peer();
        link.install(conn);
        Ok(Some(peer))
    }

    pub(crate) fn heartbeat_loop(self: &Arc<Self>, signal: &Signal) {
        loop {
            if let Err(err) = self.send(HEARTBEAT, &[]) {
                tracing::debug!(error = %err, "heartbeat not sent");
            }
            let interval = lock(&self.config).heartbeat_interval;
            if signal.wait(interval) {
                return;
            }
        }
    }
}

fn replay(conn: &mut Connection, subscriptions: &Subscriptions) -> Result<()> {
    for pattern in subscriptions.iter() {
        let payload = ControlMessage::Listen(pattern.to_string()).payload()?;
        conn.writer.send(LISTEN, &payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_for(shared: &Shared, state: ConnectionState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if shared.state() == state {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        listener.local_addr().expect("listener has address").port()
    }

    #[test]
    fn state_names_serialize_lowercase() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let shared = Shared::new(ClientConfig::default());
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        shared.send("Test", &[1, 2, 3]).expect("drop is not an error");
        assert_eq!(shared.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn unreachable_broker_keeps_connecting() {
        let config = ClientConfig::new("127.0.0.1", unused_port(), "lonely")
            .with_retry_interval(Duration::from_millis(20))
            .with_connect_timeout(Duration::from_millis(100))
            .with_log_errors(false);
        let shared = Shared::new(config);
        shared.start().expect("worker should spawn");

        thread::sleep(Duration::from_millis(100));
        assert_eq!(shared.state(), ConnectionState::Connecting);
        shared.send("Test", &[]).expect("drop is not an error");

        shared.close();
        assert_eq!(shared.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn subscriptions_replayed_before_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("listener has address").port();

        let shared = Shared::new(ClientConfig::new("127.0.0.1", port, "sub"));
        shared.subscribe("Foo*").expect("pattern is valid");
        shared.subscribe("Bar").expect("pattern is valid");
        shared.subscribe("Foo*").expect("duplicate is fine");
        shared.start().expect("worker should spawn");

        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = FrameReader::new(stream);
        assert_eq!(reader.read_handshake().expect("handshake"), "sub");

        let mut patterns = Vec::new();
        for _ in 0..2 {
            let frame = reader.read_frame().expect("listen frame");
            match ControlMessage::from_frame(&frame).expect("valid control frame") {
                Some(ControlMessage::Listen(pattern)) => patterns.push(pattern),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(patterns, vec!["Foo*".to_string(), "Bar".to_string()]);
        assert!(wait_for(&shared, ConnectionState::Connected));

        shared.close();
    }

    #[test]
    fn stale_loss_report_is_ignored() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("listener has address").port();

        let shared = Shared::new(ClientConfig::new("127.0.0.1", port, "epoch"));
        shared.start().expect("worker should spawn");
        let (_stream, _) = listener.accept().expect("listener should accept");
        assert!(wait_for(&shared, ConnectionState::Connected));

        let (epoch, reader) = shared.take_reader().expect("reader available");
        shared.connection_lost(epoch + 1, &"old connection");
        assert_eq!(shared.state(), ConnectionState::Connected);

        shared.restore_reader(epoch, reader);
        assert!(shared.take_reader().is_some());

        shared.close();
    }

    #[test]
    fn close_is_idempotent() {
        let shared = Shared::new(ClientConfig::default());
        shared.close();
        shared.close();
        assert_eq!(shared.state(), ConnectionState::Disconnected);
    }
}
