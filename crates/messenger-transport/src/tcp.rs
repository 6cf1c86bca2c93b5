use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::MessengerStream;

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Connect to a broker, trying each resolved address in turn.
///
/// Each address gets at most `timeout`, so a single call is bounded by
/// `timeout` times the number of resolved addresses.
pub fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Result<MessengerStream> {
    let addr = format!("{host}:{port}");
    let candidates = resolve(&addr, host, port)?;

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                debug!(%addr, peer = %candidate, "connected to broker");
                return Ok(MessengerStream::from_tcp(stream));
            }
            Err(err) => {
                debug!(%addr, peer = %candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(source) => Err(TransportError::Connect { addr, source }),
        None => Err(TransportError::NoAddress { addr }),
    }
}

fn resolve(addr: &str, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let resolved = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .collect::<Vec<_>>();

    if resolved.is_empty() {
        return Err(TransportError::NoAddress {
            addr: addr.to_string(),
        });
    }
    Ok(resolved)
}
