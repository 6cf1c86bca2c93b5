use std::time::Duration;

use messenger_frame::codec::MAX_STRING_LEN;
use messenger_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use messenger_transport::DEFAULT_CONNECT_TIMEOUT;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Port the reference broker listens on.
pub const DEFAULT_PORT: u16 = 5805;

/// Connection parameters and timing for a [`MessengerClient`](crate::MessengerClient).
///
/// Durations serialize as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Identity sent in the connection handshake.
    pub name: String,
    /// Report connection failures and losses at `warn` level.
    /// When disabled they are only visible at `debug`.
    pub log_errors: bool,
    /// Delay between heartbeats.
    #[serde(with = "duration_ms")]
    pub heartbeat_interval: Duration,
    /// Delay between failed connection attempts.
    #[serde(with = "duration_ms")]
    pub retry_interval: Duration,
    /// Bound on each connect attempt.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Socket read/write timeout. A frame that stalls longer than this
    /// counts as a lost connection.
    #[serde(with = "opt_duration_ms")]
    pub io_timeout: Option<Duration>,
    /// Treat the connection as lost when the broker sends no heartbeat for
    /// this long. Disabled by default.
    #[serde(with = "opt_duration_ms")]
    pub heartbeat_timeout: Option<Duration>,
    /// Largest payload accepted in either direction.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            name: "messenger-client".to_string(),
            log_errors: true,
            heartbeat_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(1),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(Duration::from_secs(2)),
            heartbeat_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    /// Configuration for a broker address and client identity, with default timing.
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_log_errors(mut self, log_errors: bool) -> Self {
        self.log_errors = log_errors;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Check that every interval and timeout is nonzero and that the
    /// identity fits in the handshake's length prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("heartbeat_interval", Some(self.heartbeat_interval)),
            ("retry_interval", Some(self.retry_interval)),
            ("connect_timeout", Some(self.connect_timeout)),
            ("io_timeout", self.io_timeout),
            ("heartbeat_timeout", self.heartbeat_timeout),
        ];
        for (field, value) in durations {
            if value.is_some_and(|duration| duration.is_zero()) {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        if self.name.len() > MAX_STRING_LEN {
            return Err(ConfigError::NameTooLong {
                len: self.name.len(),
                max: MAX_STRING_LEN,
            });
        }
        Ok(())
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.io_timeout,
            write_timeout: self.io_timeout,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
