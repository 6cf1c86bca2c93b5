use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected broker stream.
///
/// Clones created with [`MessengerStream::try_clone`] share the same socket,
/// so shutting down one handle unblocks readers on every other handle.
pub struct MessengerStream {
    inner: TcpStream,
}

impl Read for MessengerStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for MessengerStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl MessengerStream {
    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Disable Nagle's algorithm. Frames are small and latency sensitive.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Enable `SO_KEEPALIVE` so a silently vanished broker is eventually noticed.
    #[cfg(unix)]
    pub fn set_keepalive(&self, enabled: bool) -> Result<()> {
        use std::os::fd::AsRawFd;

        let value: libc::c_int = enabled.into();
        // SAFETY: `value` outlives the call and its size is passed alongside it;
        // the descriptor is an open TCP socket owned by `self.inner`.
        let rc = unsafe {
            libc::setsockopt(
                self.inner.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_KEEPALIVE,
                (&value as *const libc::c_int).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error().into())
        }
    }

    /// Enable `SO_KEEPALIVE`.
    ///
    /// No-op on platforms without a libc socket option interface.
    #[cfg(not(unix))]
    pub fn set_keepalive(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    /// Non-blocking readiness probe.
    ///
    /// Returns `true` when a read would not block: data is buffered, or the
    /// peer hung up (the next read then reports the closure).
    #[cfg(unix)]
    pub fn poll_readable(&self) -> Result<bool> {
        use std::os::fd::AsRawFd;

        let mut pfd = libc::pollfd {
            fd: self.inner.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `pfd` is a single valid pollfd and the count passed is 1;
        // a zero timeout makes the call return immediately.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }

        Ok(rc > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
    }

    /// Non-blocking readiness probe.
    #[cfg(not(unix))]
    pub fn poll_readable(&self) -> Result<bool> {
        self.inner.set_nonblocking(true)?;
        let mut probe = [0u8; 1];
        let result = self.inner.peek(&mut probe);
        self.inner.set_nonblocking(false)?;

        match result {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Shut down both directions of the socket.
    ///
    /// Blocked reads on any clone of this stream return immediately.
    pub fn shutdown(&self) {
        if let Err(err) = self.inner.shutdown(Shutdown::Both) {
            if err.kind() != std::io::ErrorKind::NotConnected {
                tracing::trace!(error = %err, "socket shutdown failed");
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Address of the connected broker.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }
}

impl std::fmt::Debug for MessengerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("MessengerStream");
        match self.inner.peer_addr() {
            Ok(addr) => dbg.field("peer", &addr),
            Err(_) => dbg.field("peer", &"<disconnected>"),
        };
        dbg.finish()
    }
}
